use serde::{Deserialize, Serialize};

use gestor_core::{Code, DomainResult, ensure_not_blank};

/// Why assets are written off (motivo de baja).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOffReason {
    pub code: Code,
    pub name: String,
    pub requires_authorization: bool,
    pub requires_document: bool,
    pub active: bool,
}

impl WriteOffReason {
    pub fn new(code: &str, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        ensure_not_blank("nombre", &name)?;
        Ok(Self {
            code: Code::parse(code)?,
            name,
            requires_authorization: false,
            requires_document: false,
            active: true,
        })
    }

    pub fn requiring_authorization(mut self) -> Self {
        self.requires_authorization = true;
        self
    }

    pub fn requiring_document(mut self) -> Self {
        self.requires_document = true;
        self
    }

    /// Reasons seeded on a fresh installation.
    pub fn defaults() -> Vec<Self> {
        [
            ("OBSOLESCENCIA", "Obsolescencia", true, false),
            ("DETERIORO", "Deterioro", true, false),
            ("ROBO", "Robo o extravío", true, true),
            ("DONACION", "Donación", true, true),
            ("VENCIMIENTO", "Vencimiento", false, false),
        ]
        .into_iter()
        .map(|(code, name, authorization, document)| Self {
            code: Code::from_static(code),
            name: name.to_string(),
            requires_authorization: authorization,
            requires_document: document,
            active: true,
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_flags() {
        let reason = WriteOffReason::new(" robo ", "Robo")
            .unwrap()
            .requiring_document()
            .requiring_authorization();
        assert_eq!(reason.code, "ROBO");
        assert!(reason.requires_document);
        assert!(reason.requires_authorization);
    }

    #[test]
    fn defaults_have_unique_codes() {
        let defaults = WriteOffReason::defaults();
        let mut codes: Vec<_> = defaults.iter().map(|r| r.code.clone()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), defaults.len());
    }
}
