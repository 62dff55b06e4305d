// View selection: one device or the whole farm
use serde::{Deserialize, Serialize};

/// Configured preference for which view opens by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultView {
    #[default]
    Auto,
    Farm,
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "device_id", rename_all = "lowercase")]
pub enum View {
    Empty,
    Single(String),
    Farm,
}

/// Resolve the view to show given the configured devices (in order), the
/// configured default and the last explicitly selected device id.
pub fn resolve_default_view(
    device_ids: &[&str],
    configured: DefaultView,
    last_selected: Option<&str>,
) -> View {
    match device_ids {
        [] => View::Empty,
        [only] => View::Single((*only).to_string()),
        [first, ..] => match configured {
            DefaultView::Farm | DefaultView::Auto => View::Farm,
            DefaultView::Single => {
                let selected = last_selected.and_then(|id| device_ids.iter().find(|d| **d == id));
                View::Single(selected.unwrap_or(first).to_string())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_devices_is_empty_view() {
        assert_eq!(resolve_default_view(&[], DefaultView::Farm, None), View::Empty);
    }

    #[test]
    fn test_single_device_is_always_single_view() {
        assert_eq!(
            resolve_default_view(&["a"], DefaultView::Farm, None),
            View::Single("a".into())
        );
    }

    #[test]
    fn test_two_devices_auto_is_farm() {
        assert_eq!(resolve_default_view(&["a", "b"], DefaultView::Auto, None), View::Farm);
        assert_eq!(resolve_default_view(&["a", "b"], DefaultView::Farm, Some("b")), View::Farm);
    }

    #[test]
    fn test_single_default_uses_last_selection() {
        assert_eq!(
            resolve_default_view(&["a", "b"], DefaultView::Single, None),
            View::Single("a".into())
        );
        assert_eq!(
            resolve_default_view(&["a", "b"], DefaultView::Single, Some("b")),
            View::Single("b".into())
        );
        assert_eq!(
            resolve_default_view(&["a", "b"], DefaultView::Single, Some("gone")),
            View::Single("a".into())
        );
    }
}
