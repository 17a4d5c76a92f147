//! Entities shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tagorm::{Entity, NullInt64, NullString, NullTime};

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[orm(table = "ref_game")]
pub struct Game {
    #[tag(json = "create_date,omitempty")]
    pub created_at: Option<DateTime<Utc>>,
    #[tag(json = "created_by,omitempty")]
    pub created_by: String,
    #[tag(json = "write_date,omitempty")]
    pub updated_at: Option<DateTime<Utc>>,
    #[tag(json = "updated_by,omitempty")]
    pub updated_by: String,
    #[tag(json = "game_id", sql = "game_id")]
    pub id: i64,
    #[tag(json = "game_code", sql = "game_code")]
    pub code: String,
    #[tag(json = "game_title", sql = "game_title")]
    pub title: String,
    #[tag(json = "game_description", sql = "game_description")]
    pub description: NullString,
    #[tag(json = "enabled", sql = "enabled")]
    pub enabled: bool,
    #[tag(json = "rate", sql = "rate")]
    pub rate: NullInt64,
    #[tag(json = "release", sql = "release")]
    pub release: NullTime,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[orm(table = "ref_user")]
pub struct User {
    #[tag(json = "user_id", sql = "id")]
    pub id: i64,
    #[tag(json = "user_name", sql = "name")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[orm(table = "ref_stock")]
pub struct Stock {
    #[tag(sql = "stock_id")]
    pub id: i64,
    #[tag(sql = "price")]
    pub price: Decimal,
    #[tag(sql = "quantity")]
    pub quantity: u32,
    #[tag(sql = "tags")]
    pub tags: Vec<String>,
}

/// A game with every persisted field set.
pub fn new_game() -> Game {
    Game {
        id: 507,
        code: uuid::Uuid::new_v4().to_string(),
        title: "DOTA2".into(),
        description: NullString::from("08675467484389"),
        enabled: true,
        rate: NullInt64::new(75),
        release: NullTime::new(Utc::now()),
        ..Default::default()
    }
}
