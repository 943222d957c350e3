//! JSON conversion for object-valued operations.
//!
//! Failures are logged here, where they are translated, and then returned.

use std::any::type_name;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SerializationError;

pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, SerializationError> {
    serde_json::to_string(value).map_err(|err| {
        let message = format!("cannot encode {} as JSON", type_name::<T>());
        tracing::error!(error = %err, "{}", message);
        SerializationError::new(message, Some(err))
    })
}

/// Decodes stored text. Missing text is an error, not a default value.
pub(crate) fn decode<T: DeserializeOwned>(text: Option<&str>) -> Result<T, SerializationError> {
    let Some(text) = text else {
        let message = format!("no stored value to decode into {}", type_name::<T>());
        tracing::error!("{}", message);
        return Err(SerializationError::new(message, None));
    };

    // Stored text may be large or sensitive; only its length is reported.
    serde_json::from_str(text).map_err(|err| {
        let message = format!(
            "cannot decode {} bytes of stored text into {}",
            text.len(),
            type_name::<T>()
        );
        tracing::error!(error = %err, "{}", message);
        SerializationError::new(message, Some(err))
    })
}
