//! Purpose: Per-entity convenience calls layered over `Dispatcher::dispatch`.
//! Exports: `Entity`, `Verb`, `Lookup`, `PageRequest`, `EntityApi`.
//! Role: Derives action names (`getKelas`, `createSiswa`, ...) and parameter shapes.
//! Invariants: Wrappers add no validation or transformation beyond parameter naming.
//! Invariants: Update/delete ids are sent as strings, under every alias the entity declares.

use super::dispatcher::Dispatcher;
use super::response::Response;
use crate::core::params::Params;
use serde_json::Value;
use std::fmt;
use tracing::warn;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Entity {
    /// Class.
    Kelas,
    /// Student.
    Siswa,
    /// Assignment.
    Tugas,
    /// Grade.
    Nilai,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verb {
    Get,
    Create,
    Update,
    Delete,
}

impl Entity {
    pub const ALL: [Entity; 4] = [Entity::Kelas, Entity::Siswa, Entity::Tugas, Entity::Nilai];

    pub fn name(self) -> &'static str {
        match self {
            Entity::Kelas => "Kelas",
            Entity::Siswa => "Siswa",
            Entity::Tugas => "Tugas",
            Entity::Nilai => "Nilai",
        }
    }

    pub fn action(self, verb: Verb) -> String {
        format!("{}{}", verb.as_str(), self.name())
    }

    /// Foreign keys the backend accepts when filtering this entity.
    pub fn relation_keys(self) -> &'static [&'static str] {
        match self {
            Entity::Kelas => &[],
            Entity::Siswa | Entity::Tugas => &["kelas_id"],
            Entity::Nilai => &["siswa_id", "tugas_id"],
        }
    }

    /// Extra parameter names that carry the record id on update and delete.
    pub fn id_aliases(self) -> &'static [&'static str] {
        match self {
            Entity::Siswa => &["siswa_id"],
            Entity::Kelas | Entity::Tugas | Entity::Nilai => &[],
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

/// Optional id plus relation filters for a `get` call; falsy values are not sent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lookup {
    id: Option<Value>,
    relations: Params,
}

impl Lookup {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::default().id(id)
    }

    pub fn id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn relation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.relations.insert(key, value);
        self
    }

    fn to_params(&self) -> Params {
        let mut params = Params::new();
        if let Some(id) = self.id.as_ref().filter(|id| !is_falsy(id)) {
            params.insert("id", id.clone());
        }
        for (key, value) in self.relations.iter() {
            if !is_falsy(value) {
                params.insert(key.clone(), value.clone());
            }
        }
        params
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
    pub filters: Params,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            filters: Params::new(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            filters: Params::new(),
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key, value);
        self
    }

    fn to_params(&self) -> Params {
        let mut params = Params::new()
            .with("page", self.page)
            .with("pageSize", self.page_size);
        params.extend(&self.filters);
        params.insert("paginated", true);
        params
    }
}

#[derive(Clone, Copy)]
pub struct EntityApi<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> EntityApi<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn login(&self, username: &str, password: &str) -> Response {
        let params = Params::new()
            .with("username", username)
            .with("password", password);
        self.dispatcher.dispatch("login", &params)
    }

    pub fn list(&self, entity: Entity) -> Response {
        self.dispatcher
            .dispatch(&entity.action(Verb::Get), &Params::new())
    }

    pub fn get_by_id(&self, entity: Entity, id: impl fmt::Display) -> Response {
        self.find(entity, &Lookup::by_id(id.to_string()))
    }

    pub fn find(&self, entity: Entity, lookup: &Lookup) -> Response {
        self.dispatcher
            .dispatch(&entity.action(Verb::Get), &lookup.to_params())
    }

    pub fn create(&self, entity: Entity, data: &Params) -> Response {
        self.dispatcher.dispatch(&entity.action(Verb::Create), data)
    }

    pub fn update(&self, entity: Entity, id: impl fmt::Display, data: &Params) -> Response {
        let mut params = data.clone();
        insert_id(&mut params, entity, &id.to_string());
        self.dispatcher
            .dispatch(&entity.action(Verb::Update), &params)
    }

    pub fn delete(&self, entity: Entity, id: impl fmt::Display) -> Response {
        let mut params = Params::new();
        insert_id(&mut params, entity, &id.to_string());
        self.dispatcher
            .dispatch(&entity.action(Verb::Delete), &params)
    }

    pub fn paginated(&self, entity: Entity, request: &PageRequest) -> Response {
        self.dispatcher
            .dispatch(&entity.action(Verb::Get), &request.to_params())
    }

    /// Classes for selection lists; any failure yields an empty list.
    pub fn class_options(&self) -> Vec<Value> {
        let response = self.list(Entity::Kelas);
        match response.data() {
            Some(Value::Array(items)) if response.is_success() => items.clone(),
            _ => {
                warn!(
                    error = response.error_message().unwrap_or("Unknown error"),
                    "failed to fetch class options"
                );
                Vec::new()
            }
        }
    }
}

impl Dispatcher {
    pub fn entities(&self) -> EntityApi<'_> {
        EntityApi::new(self)
    }
}

fn insert_id(params: &mut Params, entity: Entity, id: &str) {
    params.insert("id", id);
    for alias in entity.id_aliases() {
        params.insert(*alias, id);
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
