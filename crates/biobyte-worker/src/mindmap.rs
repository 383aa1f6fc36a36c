//! Mindmap chapter files and the tree shape the viewer renders.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};

const AS_CHAPTERS: &[(&str, &str)] = &[
    ("1", "1_Cell_structure.json"),
    ("2", "2_Biological_molecules.json"),
    ("3", "3_Enzymes.json"),
    ("4", "4_Cell_membranes_and_transport.json"),
    ("5", "5_The_mitotic_cell_cycle.json"),
    ("6", "6_Nucleic_acids_and_protein_synthesis.json"),
    ("7", "7_Transport_of_Plant.json"),
    ("8", "8_Transport_in_mammals.json"),
    ("9", "9_Gas_exchange.json"),
    ("10", "10_Infectious_diseases.json"),
    ("11", "11_Immunity.json"),
];

const A2_CHAPTERS: &[(&str, &str)] = &[
    ("12", "12_Energy_and_respiration.json"),
    ("13", "13_Photosynthesis.json"),
    ("14", "14_Homeostasis.json"),
    ("15", "15_Control_and_coordination.json"),
    ("16", "16_Inheritance.json"),
    ("17", "17_Selection_and_evolution.json"),
    ("18", "18_Classification_biodiversity_and_conservation.json"),
    ("19", "19_Genetic_technology.json"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    As,
    A2,
}

impl Level {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "as" => Some(Level::As),
            "a2" => Some(Level::A2),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::As => "AS",
            Level::A2 => "A2",
        }
    }

    fn chapters(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Level::As => AS_CHAPTERS,
            Level::A2 => A2_CHAPTERS,
        }
    }
}

/// A resolved chapter file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MindmapFile {
    pub level: Level,
    pub chapter: String,
    pub file_name: &'static str,
}

impl MindmapFile {
    pub fn asset_path(&self) -> String {
        format!("mindmaps/{}", self.file_name)
    }

    /// 404 reported when the asset store has no such file.
    pub fn missing_error(&self) -> AppError {
        match self.level {
            Level::A2 => AppError::not_found(format!(
                "A2 Level Chapter {} mindmap is not yet available. Please check back later.",
                self.chapter
            )),
            Level::As => AppError::not_found(format!(
                "Mindmap file not found: {} does not exist for AS level chapter {}",
                self.file_name, self.chapter
            )),
        }
    }
}

/// Resolve `chapter` / `level` query values to a chapter file. `All` maps to AS chapter 1.
pub fn resolve_file(chapter: Option<&str>, level: Option<&str>) -> AppResult<MindmapFile> {
    let (Some(chapter), Some(level_raw)) = (
        chapter.map(str::trim).filter(|s| !s.is_empty()),
        level.map(str::trim).filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "Chapter and level parameters are required",
        ));
    };

    let level = Level::parse(level_raw).ok_or_else(|| {
        AppError::bad_request(format!("Invalid level: {level_raw}. Must be 'as' or 'a2'"))
    })?;

    let key = if chapter == "All" { "1" } else { chapter };
    let table = level.chapters();
    match table.iter().find(|(k, _)| *k == key) {
        Some((_, file_name)) => Ok(MindmapFile {
            level,
            chapter: chapter.to_string(),
            file_name,
        }),
        None => {
            let valid: Vec<&str> = table.iter().map(|(k, _)| *k).collect();
            Err(AppError::not_found(format!(
                "Chapter {chapter} not found for {} level. Valid chapters for {}: {}",
                level.label(),
                level.label(),
                valid.join(", ")
            )))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Center,
    Left,
    Right,
}

impl Side {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "center" => Some(Side::Center),
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    pub level: i32,
    pub side: Side,
    pub children: Vec<TreeNode>,
}

pub const VIRTUAL_ROOT_ID: &str = "root";

struct Normalizer {
    next_id: usize,
    seen: HashSet<String>,
}

impl Normalizer {
    fn generated_id(&mut self) -> String {
        let id = format!("node_{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn unique_id(&mut self, raw: String, parent: Option<&str>) -> String {
        if self.seen.insert(raw.clone()) {
            return raw;
        }
        let base = match parent {
            Some(p) => format!("{p}-{raw}"),
            None => raw,
        };
        let mut candidate = base.clone();
        let mut k = 1;
        while !self.seen.insert(candidate.clone()) {
            candidate = format!("{base}-{k}");
            k += 1;
        }
        candidate
    }

    fn node(
        &mut self,
        raw: &Value,
        level: i32,
        inherited: Side,
        parent: Option<&str>,
    ) -> TreeNode {
        let raw_id = match raw.get("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let raw_id = raw_id.unwrap_or_else(|| self.generated_id());
        let id = self.unique_id(raw_id, parent);

        let label = raw
            .get("label")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| raw.get("title").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let side = raw
            .get("side")
            .and_then(Value::as_str)
            .and_then(Side::parse)
            .unwrap_or(inherited);

        let kids: &[Value] = raw
            .get("children")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let half = kids.len().div_ceil(2);
        let children = kids
            .iter()
            .enumerate()
            .map(|(i, child)| {
                // First-level branches are balanced around the root; deeper ones follow their parent.
                let child_side = if side == Side::Center {
                    if i < half {
                        Side::Right
                    } else {
                        Side::Left
                    }
                } else {
                    side
                };
                self.node(child, level + 1, child_side, Some(&id))
            })
            .collect();

        TreeNode {
            id,
            label,
            level,
            side,
            children,
        }
    }
}

/// Normalise a raw mindmap document into a single rooted tree.
///
/// Accepts one root object or an array of roots; `None` for an empty document.
pub fn normalize(data: &Value) -> Option<TreeNode> {
    let mut n = Normalizer {
        next_id: 0,
        seen: HashSet::new(),
    };

    match data {
        Value::Array(roots) if roots.is_empty() => None,
        Value::Array(roots) if roots.len() == 1 => Some(n.node(&roots[0], 0, Side::Center, None)),
        Value::Array(roots) => {
            n.seen.insert(VIRTUAL_ROOT_ID.to_string());
            let children = roots
                .iter()
                .map(|r| n.node(r, 0, Side::Center, Some(VIRTUAL_ROOT_ID)))
                .collect();
            Some(TreeNode {
                id: VIRTUAL_ROOT_ID.to_string(),
                label: "Root".to_string(),
                level: -1,
                side: Side::Center,
                children,
            })
        }
        Value::Object(_) => Some(n.node(data, 0, Side::Center, None)),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub label: String,
    /// Ancestor ids from the top of the tree down to the parent.
    pub path: Vec<String>,
}

/// Case-insensitive label search in document order.
pub fn search(tree: &TreeNode, query: &str) -> Vec<SearchHit> {
    fn walk(node: &TreeNode, needle: &str, path: &mut Vec<String>, out: &mut Vec<SearchHit>) {
        if node.level >= 0 && node.label.to_lowercase().contains(needle) {
            out.push(SearchHit {
                id: node.id.clone(),
                label: node.label.clone(),
                path: path.clone(),
            });
        }
        let pushed = node.level >= 0;
        if pushed {
            path.push(node.id.clone());
        }
        for child in &node.children {
            walk(child, needle, path, out);
        }
        if pushed {
            path.pop();
        }
    }

    let needle = query.trim().to_lowercase();
    let mut out = Vec::new();
    if needle.is_empty() {
        return out;
    }
    walk(tree, &needle, &mut Vec::new(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resolves_chapters() {
        let f = resolve_file(Some("All"), Some("AS")).unwrap();
        assert_eq!(f.file_name, "1_Cell_structure.json");
        assert_eq!(f.asset_path(), "mindmaps/1_Cell_structure.json");

        let f = resolve_file(Some("19"), Some("a2")).unwrap();
        assert_eq!(f.file_name, "19_Genetic_technology.json");
        assert!(f.missing_error().to_string().contains("not yet available"));
    }

    #[test]
    fn rejects_bad_queries() {
        assert_eq!(resolve_file(None, Some("as")).unwrap_err().status(), 400);
        assert_eq!(resolve_file(Some("1"), Some("b1")).unwrap_err().status(), 400);

        let err = resolve_file(Some("12"), Some("as")).unwrap_err();
        assert_eq!(err.status(), 404);
        assert!(err.to_string().contains("1, 2, 3"));
    }

    #[test]
    fn legacy_titles_get_generated_ids() {
        let tree = normalize(&json!({
            "title": "Cell",
            "children": [{"title": "Nucleus"}, {"title": "Membrane"}]
        }))
        .unwrap();
        assert_eq!(tree.id, "node_0");
        assert_eq!(tree.label, "Cell");
        assert_eq!(tree.side, Side::Center);
        assert_eq!(tree.children[0].id, "node_1");
        assert_eq!(tree.children[0].level, 1);
        assert_eq!(tree.children[0].side, Side::Right);
        assert_eq!(tree.children[1].side, Side::Left);
    }

    #[test]
    fn deeper_nodes_inherit_side_and_keep_explicit() {
        let tree = normalize(&json!({
            "id": "c", "label": "Center",
            "children": [
                {"id": "a", "label": "A", "children": [{"id": "a1", "label": "A1"}]},
                {"id": "b", "label": "B", "side": "right", "children": [{"id": "b1", "label": "B1"}]},
                {"id": "d", "label": "D"}
            ]
        }))
        .unwrap();
        let a = &tree.children[0];
        let b = &tree.children[1];
        let d = &tree.children[2];
        assert_eq!(a.side, Side::Right);
        assert_eq!(a.children[0].side, Side::Right);
        assert_eq!(a.children[0].level, 2);
        assert_eq!(b.side, Side::Right);
        assert_eq!(b.children[0].side, Side::Right);
        assert_eq!(d.side, Side::Left);
    }

    #[test]
    fn duplicate_ids_are_rewritten() {
        let tree = normalize(&json!({
            "id": "r", "label": "R",
            "children": [
                {"id": "x", "label": "1"},
                {"id": "p", "label": "2", "children": [{"id": "x", "label": "3"}, {"id": "x", "label": "4"}]}
            ]
        }))
        .unwrap();
        let p = &tree.children[1];
        assert_eq!(tree.children[0].id, "x");
        assert_eq!(p.children[0].id, "p-x");
        assert_eq!(p.children[1].id, "p-x-1");
    }

    #[test]
    fn multiple_roots_get_virtual_root() {
        let tree = normalize(&json!([
            {"id": "a", "label": "A"},
            {"id": "b", "label": "B"}
        ]))
        .unwrap();
        assert_eq!(tree.id, VIRTUAL_ROOT_ID);
        assert_eq!(tree.level, -1);
        assert_eq!(tree.side, Side::Center);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[1].level, 0);

        assert!(normalize(&json!([])).is_none());
        assert_eq!(normalize(&json!([{"id": "only"}])).unwrap().id, "only");
    }

    #[test]
    fn search_reports_ancestor_paths() {
        let tree = normalize(&json!([
            {"id": "a", "label": "Cell", "children": [
                {"id": "a1", "label": "Nucleus", "children": [{"id": "a11", "label": "Nucleolus"}]}
            ]},
            {"id": "b", "label": "Enzymes"}
        ]))
        .unwrap();

        let hits = search(&tree, "NUCLE");
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    id: "a1".into(),
                    label: "Nucleus".into(),
                    path: vec!["a".into()]
                },
                SearchHit {
                    id: "a11".into(),
                    label: "Nucleolus".into(),
                    path: vec!["a".into(), "a1".into()]
                },
            ]
        );
        assert!(search(&tree, "  ").is_empty());
        assert!(search(&tree, "root").is_empty());
    }
}
