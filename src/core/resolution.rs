/// Outcome of a lookup that may legitimately find nothing.
///
/// `up_to_date` distinguishes a value served from an existing local copy from
/// one that was freshly fetched or computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult<T> {
    NotFound,
    Found { value: T, up_to_date: bool },
}

impl<T> ResolutionResult<T> {
    pub fn found(value: T, up_to_date: bool) -> Self {
        ResolutionResult::Found { value, up_to_date }
    }

    pub fn not_found() -> Self {
        ResolutionResult::NotFound
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionResult::Found { .. })
    }

    /// `false` for not-found results.
    pub fn up_to_date(&self) -> bool {
        matches!(self, ResolutionResult::Found { up_to_date: true, .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            ResolutionResult::Found { value, .. } => Some(value),
            ResolutionResult::NotFound => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            ResolutionResult::Found { value, .. } => Some(value),
            ResolutionResult::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResolutionResult<U> {
        match self {
            ResolutionResult::Found { value, up_to_date } => ResolutionResult::Found {
                value: f(value),
                up_to_date,
            },
            ResolutionResult::NotFound => ResolutionResult::NotFound,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<ResolutionResult<U>, E> {
        Ok(match self {
            ResolutionResult::Found { value, up_to_date } => ResolutionResult::Found {
                value: f(value)?,
                up_to_date,
            },
            ResolutionResult::NotFound => ResolutionResult::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_preserves_freshness() {
        let cached = ResolutionResult::found(2, true).map(|v| v * 10);
        assert_eq!(cached, ResolutionResult::found(20, true));
        assert!(cached.up_to_date());

        let missing: ResolutionResult<i32> = ResolutionResult::not_found();
        assert!(!missing.up_to_date());
        assert_eq!(missing.map(|v| v + 1).into_value(), None);
    }
}
