use serde::Deserialize;

/// Default maximum record size: 64 KiB.
pub const DEFAULT_MAX_MSG_SIZE: usize = 64 * 1024;

/// Options shared by all framing protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtoOptions {
    /// Maximum size of a single record in bytes.
    pub max_msg_size: usize,
}

impl Default for ProtoOptions {
    fn default() -> Self {
        Self {
            max_msg_size: DEFAULT_MAX_MSG_SIZE,
        }
    }
}

impl ProtoOptions {
    /// Reject option sets no protocol can work with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_msg_size == 0 {
            return Err(crate::ProtoError::InvalidOptions(
                "max_msg_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(ProtoOptions::default().max_msg_size, 64 * 1024);
        assert!(ProtoOptions::default().validate().is_ok());
    }

    #[test]
    fn zero_size_is_rejected() {
        let options = ProtoOptions { max_msg_size: 0 };
        assert!(matches!(
            options.validate(),
            Err(crate::ProtoError::InvalidOptions(_))
        ));
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let options: ProtoOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ProtoOptions::default());

        let options: ProtoOptions = serde_json::from_str(r#"{"max_msg_size": 512}"#).unwrap();
        assert_eq!(options.max_msg_size, 512);
    }
}
