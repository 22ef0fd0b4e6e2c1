use async_trait::async_trait;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Database,
};

use crate::db::mongo;
use crate::error::AppResult;
use crate::models::user::User;

/// Account lookups the session extractors run on every authenticated
/// request.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>>;
}

pub struct MongoUserDirectory {
    db: Database,
}

impl MongoUserDirectory {
    pub fn new(db: Database) -> Self {
        MongoUserDirectory { db }
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_user(&self, id: ObjectId) -> AppResult<Option<User>> {
        Ok(mongo::users(&self.db).find_one(doc! { "_id": id }).await?)
    }
}
