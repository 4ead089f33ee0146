use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::http::push_opt;
use super::{ApiClient, ToolExecutor, ToolSpec, ToolkitId, parse_args, unknown_tool};
use crate::error::ToolkitError;

pub(crate) const SYSTEM_PROMPT: &str = "You can use the Google Calendar toolkit to read the user's schedule. \
List calendars first, then list events within a date range, or search events by keyword. \
Always pass a bounded time range (RFC3339) when listing events. Use \"primary\" for the user's main calendar.";

fn event_range_props() -> Value {
    json!({
        "calendarId": { "type": "string", "default": "primary" },
        "timeMin": { "type": "string", "description": "RFC3339 lower bound" },
        "timeMax": { "type": "string", "description": "RFC3339 upper bound" },
        "maxResults": { "type": "integer", "minimum": 1, "maximum": 250 }
    })
}

pub(crate) fn tools() -> Vec<ToolSpec> {
    let mut search_props = event_range_props();
    if let Some(props) = search_props.as_object_mut() {
        props.insert("query".to_string(), json!({ "type": "string" }));
    }

    vec![
        ToolSpec {
            name: "list_calendars",
            description: "List the calendars on the user's calendar list",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: "get_calendar",
            description: "Get details of one calendar",
            input_schema: json!({
                "type": "object",
                "properties": { "calendarId": { "type": "string" } },
                "required": ["calendarId"]
            }),
        },
        ToolSpec {
            name: "list_events",
            description: "List events of a calendar within a time range",
            input_schema: json!({ "type": "object", "properties": event_range_props() }),
        },
        ToolSpec {
            name: "get_event",
            description: "Get details of one event",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "calendarId": { "type": "string", "default": "primary" },
                    "eventId": { "type": "string" }
                },
                "required": ["eventId"]
            }),
        },
        ToolSpec {
            name: "search_events",
            description: "Find events matching free text",
            input_schema: json!({
                "type": "object",
                "properties": search_props,
                "required": ["query"]
            }),
        },
    ]
}

fn primary() -> String {
    "primary".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarArgs {
    calendar_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsArgs {
    #[serde(default = "primary")]
    calendar_id: String,
    #[serde(default)]
    time_min: Option<String>,
    #[serde(default)]
    time_max: Option<String>,
    #[serde(default)]
    max_results: Option<u32>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventArgs {
    #[serde(default = "primary")]
    calendar_id: String,
    event_id: String,
}

pub(crate) struct CalendarTools {
    api: ApiClient,
}

impl CalendarTools {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn list_events(&self, args: EventsArgs) -> Result<Value, ToolkitError> {
        let mut query = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            (
                "maxResults",
                args.max_results.unwrap_or(25).clamp(1, 250).to_string(),
            ),
        ];
        push_opt(&mut query, "timeMin", args.time_min.as_deref());
        push_opt(&mut query, "timeMax", args.time_max.as_deref());
        push_opt(&mut query, "q", args.query.as_deref());

        let found = self
            .api
            .get(&["calendars", &args.calendar_id, "events"], &query)
            .await?;
        let events: Vec<Value> = found["items"]
            .as_array()
            .map(|items| items.iter().map(summarize_event).collect())
            .unwrap_or_default();
        Ok(json!({ "events": events, "nextPageToken": found["nextPageToken"] }))
    }
}

fn summarize_event(e: &Value) -> Value {
    json!({
        "id": e["id"],
        "summary": e["summary"],
        "start": e["start"],
        "end": e["end"],
        "location": e["location"],
        "status": e["status"],
        "htmlLink": e["htmlLink"],
        "attendees": e["attendees"].as_array().map(|list| {
            list.iter().map(|a| a["email"].clone()).collect::<Vec<_>>()
        }),
    })
}

#[async_trait]
impl ToolExecutor for CalendarTools {
    fn specs(&self) -> Vec<ToolSpec> {
        tools()
    }

    async fn call(&self, name: &str, args: Value) -> Result<Value, ToolkitError> {
        match name {
            "list_calendars" => {
                let found = self.api.get(&["users", "me", "calendarList"], &[]).await?;
                let calendars: Vec<Value> = found["items"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|c| {
                                json!({
                                    "id": c["id"],
                                    "summary": c["summary"],
                                    "primary": c["primary"].as_bool().unwrap_or(false),
                                    "accessRole": c["accessRole"],
                                    "timeZone": c["timeZone"],
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(json!({ "calendars": calendars }))
            }
            "get_calendar" => {
                let args: CalendarArgs = parse_args(name, args)?;
                self.api.get(&["calendars", &args.calendar_id], &[]).await
            }
            "list_events" => {
                let mut args: EventsArgs = parse_args(name, args)?;
                args.query = None;
                self.list_events(args).await
            }
            "get_event" => {
                let args: EventArgs = parse_args(name, args)?;
                self.api
                    .get(&["calendars", &args.calendar_id, "events", &args.event_id], &[])
                    .await
            }
            "search_events" => {
                let args: EventsArgs = parse_args(name, args)?;
                if args.query.as_deref().is_none_or(|q| q.trim().is_empty()) {
                    return Err(ToolkitError::bad_request("search_events requires a query"));
                }
                self.list_events(args).await
            }
            other => Err(unknown_tool(ToolkitId::GoogleCalendar, other)),
        }
    }
}
