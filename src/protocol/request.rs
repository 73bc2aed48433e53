use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::{statement::SqlStatement, value::TypedValue};

use super::codec::{CodecError, decode_value, encode_value};

/// Query-string key carrying the command selector.
pub const COMMAND_KEY: &str = "cmd";
/// Query-string key carrying the login response.
pub const CODE_KEY: &str = "code";
/// Form key carrying the statement text.
pub const STATEMENT_KEY: &str = "q";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// The transport-level shape of a request: a method, query-string pairs and form pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(query: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Get,
            query,
            form: Vec::new(),
        }
    }

    pub fn post(form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            query: Vec::new(),
            form,
        }
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A protocol request, as routed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Challenge,
    Login {
        code: String,
    },
    Logout,
    /// Statement text plus parameters, each a base64-encoded value.
    Execute {
        text: String,
        params: Vec<(String, String)>,
    },
}

impl Request {
    /// Builds an execute request from scratch; nothing bound to an earlier statement
    /// carries over.
    pub fn execute(statement: &SqlStatement) -> Result<Self, CodecError> {
        let params = statement
            .params()
            .iter()
            .map(|(name, value)| Ok((name.clone(), BASE64.encode(encode_value(value)?))))
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(Request::Execute {
            text: statement.text().to_string(),
            params,
        })
    }

    /// Routes on the `cmd` selector; anything else is an execute request.
    pub fn from_http(request: &HttpRequest) -> Self {
        match request.query_param(COMMAND_KEY) {
            Some("challenge") => Request::Challenge,
            Some("login") => Request::Login {
                code: request.query_param(CODE_KEY).unwrap_or_default().to_string(),
            },
            Some("logout") => Request::Logout,
            _ => {
                let mut text = String::new();
                let mut params = Vec::new();
                for (key, value) in &request.form {
                    if key == STATEMENT_KEY {
                        text = value.clone();
                    } else {
                        params.push((key.clone(), value.clone()));
                    }
                }
                Request::Execute { text, params }
            }
        }
    }
}

impl From<Request> for HttpRequest {
    fn from(value: Request) -> Self {
        let command = |name: &str| (COMMAND_KEY.to_string(), name.to_string());

        match value {
            Request::Challenge => HttpRequest::get(vec![command("challenge")]),
            Request::Login { code } => {
                HttpRequest::get(vec![command("login"), (CODE_KEY.to_string(), code)])
            }
            Request::Logout => HttpRequest::get(vec![command("logout")]),
            Request::Execute { text, params } => {
                let mut form = Vec::with_capacity(params.len() + 1);
                form.push((STATEMENT_KEY.to_string(), text));
                form.extend(params);
                HttpRequest::post(form)
            }
        }
    }
}

/// Decodes one base64 parameter payload back into a value.
pub fn decode_param(payload: &str) -> Result<TypedValue, CodecError> {
    decode_value(&BASE64.decode(payload)?)
}
