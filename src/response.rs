use axum::Json;
use serde::{Deserialize, Serialize};

/// The `{message, data}` shape every JSON response uses.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub message: String,
    pub data: T,
}

pub fn respond<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        message: message.into(),
        data,
    })
}
