use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::Patch;

/// A stored task as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub titulo: Option<String>,
    pub descricao: Option<String>,
    pub concluida: bool,
}

/// Errors raised while validating task input
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Field '{0}' cannot be null")]
    NullNotAllowed(&'static str),
}

/// Body of POST /tarefas
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub titulo: Option<String>,
    pub descricao: Option<String>,
    #[serde(default)]
    pub concluida: bool,
}

/// Body of PUT /tarefas/:id. Only keys present in the request are written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub titulo: Patch<String>,
    #[serde(default)]
    pub descricao: Patch<String>,
    #[serde(default)]
    pub concluida: Patch<bool>,
}

/// Persisted document body (everything except the id)
#[derive(Debug, Deserialize)]
struct TaskDocument {
    #[serde(default)]
    titulo: Option<String>,
    #[serde(default)]
    descricao: Option<String>,
    #[serde(default)]
    concluida: Option<bool>,
}

impl Task {
    /// Rebuild a task from its stored document
    pub fn from_document(id: Uuid, document: Value) -> Result<Self, serde_json::Error> {
        let doc: TaskDocument = serde_json::from_value(document)?;
        Ok(Self {
            id,
            titulo: doc.titulo,
            descricao: doc.descricao,
            concluida: doc.concluida.unwrap_or(false),
        })
    }
}

impl NewTask {
    pub fn into_task(self, id: Uuid) -> Task {
        Task {
            id,
            titulo: self.titulo,
            descricao: self.descricao,
            concluida: self.concluida,
        }
    }

    pub fn to_document(&self) -> Value {
        serde_json::json!({
            "titulo": self.titulo,
            "descricao": self.descricao,
            "concluida": self.concluida,
        })
    }
}

impl TaskPatch {
    /// `concluida` is always a boolean once a task exists
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.concluida == Patch::Null {
            return Err(TaskError::NullNotAllowed("concluida"));
        }
        Ok(())
    }

    /// Partial document holding only the supplied keys, suitable for a JSON merge
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        set_field(&mut doc, "titulo", self.titulo.clone().map(Value::String));
        set_field(&mut doc, "descricao", self.descricao.clone().map(Value::String));
        set_field(&mut doc, "concluida", self.concluida.clone().map(Value::Bool));
        Value::Object(doc)
    }

    pub fn apply(self, task: Task) -> Task {
        Task {
            id: task.id,
            titulo: self.titulo.apply(task.titulo),
            descricao: self.descricao.apply(task.descricao),
            concluida: self.concluida.apply(Some(task.concluida)).unwrap_or(task.concluida),
        }
    }
}

fn set_field(doc: &mut Map<String, Value>, key: &str, field: Patch<Value>) {
    match field {
        Patch::Absent => {}
        Patch::Null => {
            doc.insert(key.to_string(), Value::Null);
        }
        Patch::Value(v) => {
            doc.insert(key.to_string(), v);
        }
    }
}
