//! Response envelope
//!
//! Every controller answers with the same JSON shape:
//! `{success, data?, message?, errors?, meta?, pagination?}` plus an HTTP
//! status carried alongside for the transport layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::AdminError;
use crate::types::{PaginatedResult, PaginationMeta};

/// JSON response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the request succeeded
    pub success: bool,

    /// Payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Field errors (field -> messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,

    /// Extra metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    /// Pagination block for list responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl Envelope {
    fn success(data: Option<Value>, message: Option<String>) -> Self {
        Self {
            success: true,
            data,
            message,
            errors: None,
            meta: None,
            pagination: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors: None,
            meta: None,
            pagination: None,
        }
    }
}

/// A response ready for the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,

    /// JSON body (`None` for 204)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Envelope>,
}

impl ApiResponse {
    /// 200 with data.
    pub fn ok(data: Value) -> Self {
        Self {
            status: 200,
            body: Some(Envelope::success(Some(data), None)),
        }
    }

    /// 200 with data and a message.
    pub fn ok_with_message(data: Value, message: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: Some(Envelope::success(Some(data), Some(message.into()))),
        }
    }

    /// 200 with a page of rows and the pagination block.
    pub fn paginated(page: PaginatedResult<Value>) -> Self {
        let pagination = page.meta();
        let mut envelope = Envelope::success(Some(Value::Array(page.data)), None);
        envelope.pagination = Some(pagination);
        Self {
            status: 200,
            body: Some(envelope),
        }
    }

    /// 201 with the created record.
    pub fn created(data: Value, message: impl Into<String>) -> Self {
        Self {
            status: 201,
            body: Some(Envelope::success(Some(data), Some(message.into()))),
        }
    }

    /// 204 without a body.
    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    /// 400 with a message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            body: Some(Envelope::failure(message)),
        }
    }

    /// 403 with a message.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: 403,
            body: Some(Envelope::failure(message)),
        }
    }

    /// 404 with a message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: 404,
            body: Some(Envelope::failure(message)),
        }
    }

    /// 404 phrased as "`<Type>` with ID `<id>` not found".
    pub fn resource_not_found(record_type: &str, id: u64) -> Self {
        Self::not_found(format!("{} with ID {} not found", record_type, id))
    }

    /// 409 with a message.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: 409,
            body: Some(Envelope::failure(message)),
        }
    }

    /// 422 with per-field errors.
    pub fn unprocessable(message: impl Into<String>, errors: BTreeMap<String, Vec<String>>) -> Self {
        let mut envelope = Envelope::failure(message);
        envelope.errors = Some(errors);
        Self {
            status: 422,
            body: Some(envelope),
        }
    }

    /// 500 with a message.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            body: Some(Envelope::failure(message)),
        }
    }

    /// Map an error onto the envelope.
    ///
    /// Field-level `InvalidArgument` errors become 422 with an `errors` map;
    /// server-side failures hide their detail.
    pub fn from_error(err: &AdminError) -> Self {
        match err {
            AdminError::InvalidArgument {
                field: Some(field),
                message,
            } => {
                let mut errors = BTreeMap::new();
                errors.insert(field.clone(), vec![message.clone()]);
                Self::unprocessable("Validation failed", errors)
            }
            AdminError::InvalidArgument { field: None, message } => Self::bad_request(message.clone()),
            AdminError::Forbidden { .. } => Self::forbidden(err.to_string()),
            AdminError::NotFound(message) => Self::not_found(message.clone()),
            AdminError::Conflict(message) => Self::conflict(message.clone()),
            AdminError::PartialFailure {
                succeeded, total, ..
            } => {
                let mut envelope = Envelope::failure(err.to_string());
                envelope.meta = Some(serde_json::json!({
                    "succeeded": succeeded,
                    "total": total,
                }));
                Self {
                    status: err.status_code(),
                    body: Some(envelope),
                }
            }
            _ => {
                tracing::error!(error = %err, code = err.error_code(), "Request failed");
                Self::internal_error("Internal server error")
            }
        }
    }

    /// Attach metadata to the body.
    pub fn with_meta(mut self, meta: Value) -> Self {
        if let Some(ref mut body) = self.body {
            body.meta = Some(meta);
        }
        self
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body data, if any.
    pub fn data(&self) -> Option<&Value> {
        self.body.as_ref().and_then(|b| b.data.as_ref())
    }

    /// Body message, if any.
    pub fn message(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.message.as_deref())
    }
}
