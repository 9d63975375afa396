use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::{AppError, RejectReason};

/// JSON body that has been deserialized and passed its `Validate` rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    let reason = match rejection.status() {
        StatusCode::UNSUPPORTED_MEDIA_TYPE => RejectReason::UnsupportedMediaType,
        StatusCode::PAYLOAD_TOO_LARGE => RejectReason::PayloadTooLarge,
        _ => RejectReason::MalformedBody,
    };
    tracing::debug!(error = %rejection.body_text(), "JSON body rejected");
    AppError::Rejected(reason)
}

/// For endpoints whose body is optional: an empty body means `T::default()`.
pub fn optional_validated_json<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Validate + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value: T = serde_json::from_slice(body)
        .map_err(|_| AppError::Rejected(RejectReason::MalformedBody))?;
    value.validate()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CreateLicenseRequest;

    #[test]
    fn empty_optional_body_is_default() {
        let req: CreateLicenseRequest = optional_validated_json(&Bytes::new()).unwrap();
        assert!(req.code.is_none());
    }

    #[test]
    fn optional_body_is_still_validated() {
        let err = optional_validated_json::<CreateLicenseRequest>(&Bytes::from_static(br#"{"code":"no spaces!"}"#))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = optional_validated_json::<CreateLicenseRequest>(&Bytes::from_static(b"{not json"))
            .unwrap_err();
        assert!(matches!(err, AppError::Rejected(RejectReason::MalformedBody)));
    }
}
