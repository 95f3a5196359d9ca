use serde_json::Value;

use super::response::ApiError;
use crate::types::{Caller, Document};

/// Only the path user or an elevated caller may proceed.
pub fn can_edit(caller: &Caller, user: &str) -> Result<(), ApiError> {
    if caller.can_act_for(user) {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

/// Verbose views are honoured only for the path user or an elevated caller.
pub fn verbose_for(caller: Option<&Caller>, user: &str, requested: bool) -> bool {
    requested && caller.is_some_and(|c| c.can_act_for(user))
}

pub fn views<T: Document>(items: &[T], verbose: bool) -> Result<Vec<Value>, ApiError> {
    items
        .iter()
        .map(|item| item.to_view(verbose).map_err(ApiError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrivilegeTier;

    #[test]
    fn test_can_edit() {
        let george = Caller::new("george", PrivilegeTier::Regular);
        let admin = Caller::new("root", PrivilegeTier::Admin);

        assert!(can_edit(&george, "george").is_ok());
        assert!(can_edit(&admin, "george").is_ok());
        let err = can_edit(&george, "jane").unwrap_err();
        assert_eq!(err.message, "You do not have permission");
    }

    #[test]
    fn test_verbose_for() {
        let george = Caller::new("george", PrivilegeTier::Regular);
        assert!(verbose_for(Some(&george), "george", true));
        assert!(!verbose_for(Some(&george), "jane", true));
        assert!(!verbose_for(None, "george", true));
        assert!(!verbose_for(Some(&george), "george", false));
    }
}
