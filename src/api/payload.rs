//! Request bodies accepted as JSON or urlencoded forms.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

use super::ApiError;

const INVALID_BODY: &str = "Invalid request body";

/// Body extractor that reads JSON or `application/x-www-form-urlencoded`.
///
/// An empty body yields `T::default()`, so every field of `T` should be optional.
#[derive(Debug, Default)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|_| ApiError::BadRequest(INVALID_BODY))?;
            return Ok(Self(value));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::BadRequest(INVALID_BODY))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|_| ApiError::BadRequest(INVALID_BODY))
    }
}

/// Empty strings count as absent, like a falsy value in a form field.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Group names given either as a list or as one `|`/`,` separated string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupList(pub Vec<String>);

impl<'de> Deserialize<'de> for GroupList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<String>),
            Joined(String),
        }

        let groups = match Raw::deserialize(deserializer)? {
            Raw::List(list) => list,
            Raw::Joined(joined) => joined
                .split(['|', ','])
                .map(str::to_string)
                .collect(),
        };
        Ok(Self(
            groups
                .into_iter()
                .map(|group| group.trim().to_string())
                .filter(|group| !group.is_empty())
                .collect(),
        ))
    }
}
