use crate::db::models::{
    BranchRequest, ChatFilter, ChatWithWorkbench, DbAccount, DbChat, DbMessage, DbUser,
    DbWorkbench, NewAccount, NewChat, NewMessage, NewUser, NewWorkbench,
};
use crate::db::ops::{accounts, chats, messages, users, workbenches};
use crate::db::patch::{DbPatchable, EntityPatch};
use crate::db::schema::SQLITE_INIT;
use crate::error::ToolkitError;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use toolkit_schema::{Page, PageInput};
use tracing::info;

type Reply<T> = RpcReplyPort<Result<T, ToolkitError>>;

#[derive(Debug)]
pub enum DbActorMessage {
    /// Apply a COALESCE patch to one row.
    Patch(EntityPatch, Reply<()>),

    GetUser(String, Reply<Option<DbUser>>),
    InsertUser(NewUser, Reply<DbUser>),
    UpsertUser(NewUser, Reply<DbUser>),
    DeleteUser(String, Reply<bool>),

    ListWorkbenches(String, PageInput, Reply<Page<DbWorkbench>>),
    /// (id, owner)
    GetWorkbench(String, String, Reply<Option<DbWorkbench>>),
    CreateWorkbench(NewWorkbench, Reply<DbWorkbench>),
    DeleteWorkbench(String, String, Reply<Option<DbWorkbench>>),

    ListChats(ChatFilter, PageInput, Reply<Page<DbChat>>),
    GetChat(String, Reply<Option<DbChat>>),
    GetChatWithWorkbench(String, Reply<Option<ChatWithWorkbench>>),
    CreateChat(NewChat, Reply<DbChat>),
    DeleteChat(String, String, Reply<Option<DbChat>>),
    BranchChat(BranchRequest, Reply<DbChat>),

    ListMessages(String, Reply<Vec<DbMessage>>),
    CreateMessage(NewMessage, Reply<DbMessage>),

    ListAccounts(String, PageInput, Reply<Page<DbAccount>>),
    /// (owner, provider)
    GetAccountByProvider(String, String, Reply<Option<DbAccount>>),
    UpsertAccount(NewAccount, Reply<DbAccount>),
    DeleteAccount(String, String, Reply<bool>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

macro_rules! db_call {
    ($self:ident, $variant:ident $(, $arg:expr)*) => {
        ractor::call!($self.actor, DbActorMessage::$variant $(, $arg)*).map_err(|e| {
            ToolkitError::RactorError(format!(
                concat!("DbActor ", stringify!($variant), " RPC failed: {}"),
                e
            ))
        })?
    };
}

impl DbActorHandle {
    pub async fn patch(&self, patch: EntityPatch) -> Result<(), ToolkitError> {
        db_call!(self, Patch, patch)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<DbUser>, ToolkitError> {
        db_call!(self, GetUser, id.to_string())
    }

    pub async fn insert_user(&self, user: NewUser) -> Result<DbUser, ToolkitError> {
        db_call!(self, InsertUser, user)
    }

    pub async fn upsert_user(&self, user: NewUser) -> Result<DbUser, ToolkitError> {
        db_call!(self, UpsertUser, user)
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool, ToolkitError> {
        db_call!(self, DeleteUser, id.to_string())
    }

    pub async fn list_workbenches(
        &self,
        user_id: &str,
        page: PageInput,
    ) -> Result<Page<DbWorkbench>, ToolkitError> {
        db_call!(self, ListWorkbenches, user_id.to_string(), page)
    }

    pub async fn get_workbench(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<DbWorkbench>, ToolkitError> {
        db_call!(self, GetWorkbench, id.to_string(), user_id.to_string())
    }

    pub async fn create_workbench(&self, wb: NewWorkbench) -> Result<DbWorkbench, ToolkitError> {
        db_call!(self, CreateWorkbench, wb)
    }

    pub async fn delete_workbench(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<DbWorkbench>, ToolkitError> {
        db_call!(self, DeleteWorkbench, id.to_string(), user_id.to_string())
    }

    pub async fn list_chats(
        &self,
        filter: ChatFilter,
        page: PageInput,
    ) -> Result<Page<DbChat>, ToolkitError> {
        db_call!(self, ListChats, filter, page)
    }

    pub async fn get_chat(&self, id: &str) -> Result<Option<DbChat>, ToolkitError> {
        db_call!(self, GetChat, id.to_string())
    }

    pub async fn get_chat_with_workbench(
        &self,
        id: &str,
    ) -> Result<Option<ChatWithWorkbench>, ToolkitError> {
        db_call!(self, GetChatWithWorkbench, id.to_string())
    }

    pub async fn create_chat(&self, chat: NewChat) -> Result<DbChat, ToolkitError> {
        db_call!(self, CreateChat, chat)
    }

    pub async fn delete_chat(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<DbChat>, ToolkitError> {
        db_call!(self, DeleteChat, id.to_string(), user_id.to_string())
    }

    pub async fn branch_chat(&self, req: BranchRequest) -> Result<DbChat, ToolkitError> {
        db_call!(self, BranchChat, req)
    }

    pub async fn list_messages(&self, chat_id: &str) -> Result<Vec<DbMessage>, ToolkitError> {
        db_call!(self, ListMessages, chat_id.to_string())
    }

    pub async fn create_message(&self, msg: NewMessage) -> Result<DbMessage, ToolkitError> {
        db_call!(self, CreateMessage, msg)
    }

    pub async fn list_accounts(
        &self,
        user_id: &str,
        page: PageInput,
    ) -> Result<Page<DbAccount>, ToolkitError> {
        db_call!(self, ListAccounts, user_id.to_string(), page)
    }

    pub async fn get_account_by_provider(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<DbAccount>, ToolkitError> {
        db_call!(
            self,
            GetAccountByProvider,
            user_id.to_string(),
            provider.to_string()
        )
    }

    pub async fn upsert_account(&self, acc: NewAccount) -> Result<DbAccount, ToolkitError> {
        db_call!(self, UpsertAccount, acc)
    }

    pub async fn delete_account(&self, id: &str, user_id: &str) -> Result<bool, ToolkitError> {
        db_call!(self, DeleteAccount, id.to_string(), user_id.to_string())
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        match message {
            DbActorMessage::Patch(patch, reply) => {
                let _ = reply.send(patch.apply_patch(pool).await);
            }

            DbActorMessage::GetUser(id, reply) => {
                let _ = reply.send(users::get(pool, &id).await);
            }
            DbActorMessage::InsertUser(user, reply) => {
                let _ = reply.send(users::insert(pool, user).await);
            }
            DbActorMessage::UpsertUser(user, reply) => {
                let _ = reply.send(users::upsert(pool, user).await);
            }
            DbActorMessage::DeleteUser(id, reply) => {
                let _ = reply.send(users::delete(pool, &id).await);
            }

            DbActorMessage::ListWorkbenches(user_id, page, reply) => {
                let _ = reply.send(workbenches::list(pool, &user_id, &page).await);
            }
            DbActorMessage::GetWorkbench(id, user_id, reply) => {
                let _ = reply.send(workbenches::get(pool, &id, &user_id).await);
            }
            DbActorMessage::CreateWorkbench(wb, reply) => {
                let _ = reply.send(workbenches::create(pool, wb).await);
            }
            DbActorMessage::DeleteWorkbench(id, user_id, reply) => {
                let _ = reply.send(workbenches::delete(pool, &id, &user_id).await);
            }

            DbActorMessage::ListChats(filter, page, reply) => {
                let _ = reply.send(chats::list(pool, &filter, &page).await);
            }
            DbActorMessage::GetChat(id, reply) => {
                let _ = reply.send(chats::get(pool, &id).await);
            }
            DbActorMessage::GetChatWithWorkbench(id, reply) => {
                let _ = reply.send(chats::get_with_workbench(pool, &id).await);
            }
            DbActorMessage::CreateChat(chat, reply) => {
                let _ = reply.send(chats::create(pool, chat).await);
            }
            DbActorMessage::DeleteChat(id, user_id, reply) => {
                let _ = reply.send(chats::delete(pool, &id, &user_id).await);
            }
            DbActorMessage::BranchChat(req, reply) => {
                let _ = reply.send(chats::branch(pool, req).await);
            }

            DbActorMessage::ListMessages(chat_id, reply) => {
                let _ = reply.send(messages::list(pool, &chat_id).await);
            }
            DbActorMessage::CreateMessage(msg, reply) => {
                let _ = reply.send(messages::create(pool, msg).await);
            }

            DbActorMessage::ListAccounts(user_id, page, reply) => {
                let _ = reply.send(accounts::list(pool, &user_id, &page).await);
            }
            DbActorMessage::GetAccountByProvider(user_id, provider, reply) => {
                let _ = reply.send(accounts::get_by_provider(pool, &user_id, &provider).await);
            }
            DbActorMessage::UpsertAccount(acc, reply) => {
                let _ = reply.send(accounts::upsert(pool, acc).await);
            }
            DbActorMessage::DeleteAccount(id, user_id, reply) => {
                let _ = reply.send(accounts::delete(pool, &id, &user_id).await);
            }
        }
        Ok(())
    }
}

/// Spawn the database actor and return a cloneable handle.
///
/// The actor is unnamed so several instances (one per test database) can
/// coexist in one process.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, ToolkitError> {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .map_err(|e| ToolkitError::RactorError(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), ToolkitError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
