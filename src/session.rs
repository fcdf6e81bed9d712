// The single authentication credential for the process. Owned by the
// ApiClient and passed around explicitly so tests never touch shared
// global state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    // Idempotent; clearing an empty session is a no-op.
    pub fn clear(&mut self) {
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unauthenticated() {
        let session = Session::new();
        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);
    }

    #[test]
    fn set_then_clear_round_trip() {
        let mut session = Session::new();
        session.set_token("tok-123".to_string());
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("tok-123"));

        session.clear();
        assert!(!session.is_authenticated());

        // clearing twice stays cleared
        session.clear();
        assert!(!session.is_authenticated());
    }
}
