use serde::{Deserialize, Serialize};

/// Body of `POST /login`. Fields are optional so a missing one maps to a 400 with our message.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default, alias = "nome_completo")]
    pub full_name: Option<String>,
    #[serde(default, alias = "senha")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub id: i64,
}
