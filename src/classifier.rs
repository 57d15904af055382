use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::catalog::{CatalogEntry, SourceKind, CATALOG};

#[derive(Debug, Clone)]
pub struct Binding {
    pub entry: &'static CatalogEntry,
    pub path: PathBuf,
}

impl Binding {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ambiguity {
    pub kind: SourceKind,
    pub chosen: String,
    pub ignored: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// In catalog order.
    pub bindings: Vec<Binding>,
    pub ambiguities: Vec<Ambiguity>,
    pub unmatched: Vec<String>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn named_files(staged: &[PathBuf]) -> Vec<(String, PathBuf)> {
    let mut files = staged
        .iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some((name, path.clone()))
        })
        .collect::<Vec<_>>();
    files.sort();
    files.dedup();
    files
}

pub fn classify(staged: &[PathBuf]) -> Classification {
    let files = named_files(staged);

    let mut out = Classification::default();
    let mut claimed = HashSet::new();
    for entry in CATALOG.iter() {
        let matching = files
            .iter()
            .filter(|(name, _)| entry.matches(name))
            .collect::<Vec<_>>();
        let Some(((chosen, path), rest)) = matching.split_first().map(|(f, r)| (*f, r)) else {
            continue;
        };

        if !rest.is_empty() {
            let ignored = rest.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>();
            warn!(
                "{:?} matched {} files, using {chosen} and ignoring {}",
                entry.kind,
                matching.len(),
                ignored.join(", ")
            );
            out.ambiguities.push(Ambiguity {
                kind: entry.kind,
                chosen: chosen.clone(),
                ignored,
            });
        }
        for (name, _) in &matching {
            claimed.insert(name.clone());
        }
        info!("{:?} <- {chosen}", entry.kind);
        out.bindings.push(Binding {
            entry,
            path: path.clone(),
        });
    }

    out.unmatched = files
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| !claimed.contains(name))
        .collect();
    for name in &out.unmatched {
        warn!("staged file {name} matches no known source");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn staged(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|name| Path::new("TMP").join(name)).collect()
    }

    #[test]
    fn first_file_in_name_order_wins() {
        let c = classify(&staged(&[
            "S4データ_b.xlsx",
            "S4データ_a.xlsx",
            "財務諸表.xlsx",
            "memo.xlsx",
        ]));
        let bound = c
            .bindings
            .iter()
            .map(|b| (b.entry.kind, b.file_name()))
            .collect::<Vec<_>>();
        assert_eq!(
            bound,
            vec![
                (SourceKind::ActualExpenses, "S4データ_a.xlsx".to_string()),
                (SourceKind::FinancialStatements, "財務諸表.xlsx".to_string()),
            ]
        );
        assert_eq!(c.ambiguities.len(), 1);
        assert_eq!(c.ambiguities[0].kind, SourceKind::ActualExpenses);
        assert_eq!(c.ambiguities[0].ignored, vec!["S4データ_b.xlsx".to_string()]);
        assert_eq!(c.unmatched, vec!["memo.xlsx".to_string()]);
    }

    #[test]
    fn bindings_follow_catalog_order() {
        let c = classify(&staged(&[
            "品目一覧表.xlsx",
            "2405値引き.xlsx",
            "受注売上受注残.xlsx",
        ]));
        let kinds = c.bindings.iter().map(|b| b.entry.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                SourceKind::SalesBacklog,
                SourceKind::Discounts,
                SourceKind::ItemList
            ]
        );
        assert!(c.ambiguities.is_empty());
        assert!(c.unmatched.is_empty());
    }

    #[test]
    fn same_output_listed_twice_binds_once() {
        // 品目一覧表.xls and 品目一覧表.xlsx both stage to one file
        let c = classify(&staged(&["品目一覧表.xlsx", "品目一覧表.xlsx"]));
        assert_eq!(c.bindings.len(), 1);
        assert!(c.ambiguities.is_empty());
    }

    #[test]
    fn nothing_staged_yields_nothing() {
        assert!(classify(&[]).is_empty());
    }
}
