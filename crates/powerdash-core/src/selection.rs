// ── Selection ──

use crate::graph::AssetGraph;
use crate::model::{Asset, AssetKey};

/// The one asset the operator is looking at, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionController {
    selected: Option<AssetKey>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `key`, or clear the selection if `key` is already selected.
    pub fn select(&mut self, key: AssetKey) -> Option<&AssetKey> {
        if self.selected.as_ref() == Some(&key) {
            self.selected = None;
        } else {
            self.selected = Some(key);
        }
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&AssetKey> {
        self.selected.as_ref()
    }

    /// The selected asset, if it still resolves.
    pub fn selected_asset<'g>(&self, graph: &'g AssetGraph) -> Option<&'g Asset> {
        graph.resolve(self.selected.as_ref()?)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::AssetKind;

    #[test]
    fn selecting_twice_restores_prior_state() {
        let mut sel = SelectionController::new();
        sel.select("7".into());
        let before = sel.clone();

        sel.select("9".into());
        sel.select("9".into());
        assert_eq!(sel.selected(), None);

        let mut sel = before.clone();
        sel.select("7".into());
        sel.select("7".into());
        assert_eq!(sel, before);
    }

    #[test]
    fn switching_keys_replaces_selection() {
        let mut sel = SelectionController::new();
        sel.select("1".into());
        assert_eq!(sel.select("2".into()).map(AssetKey::as_str), Some("2"));
    }

    #[test]
    fn selected_asset_resolves_components() {
        let mut g = AssetGraph::new();
        g.load_snapshot(
            vec![Asset::new("1111", AssetKind::Pdu).with_child(Asset::new("11113", AssetKind::Outlet))],
            None,
        );
        let mut sel = SelectionController::new();
        sel.select("11113".into());
        assert_eq!(sel.selected_asset(&g).unwrap().kind, AssetKind::Outlet);

        sel.select("404".into());
        assert!(sel.selected_asset(&g).is_none());
        sel.clear();
        assert!(sel.selected().is_none());
    }
}
