//! Unified class table.
//!
//! Classes are collected across every exported annotation, sorted
//! lexicographically, and numbered contiguously from 0. The table is the
//! single source of truth for `data.yaml`, COCO categories, and CSV ids.

use std::collections::{BTreeSet, HashMap};

use labelforge_core::Annotation;

/// Lexicographically sorted, contiguously numbered class catalog.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl ClassTable {
    /// Collects the table from all annotations that will be exported.
    pub fn collect<'a>(annotations: impl IntoIterator<Item = &'a Annotation>) -> Self {
        let unique: BTreeSet<String> = annotations
            .into_iter()
            .map(|a| a.class_name().to_string())
            .collect();
        let names: Vec<String> = unique.into_iter().collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i as u32))
            .collect();
        Self { names, index }
    }

    /// Unified id for a class name.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    /// Class names in id order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rewrites every annotation's class id to the unified table.
    ///
    /// Annotations whose class is somehow absent keep their id; collection
    /// and remapping always run over the same set, so this does not happen
    /// in practice.
    pub fn remap(&self, annotations: &mut [Annotation]) {
        for ann in annotations {
            if let Some(id) = self.id_of(ann.class_name()) {
                ann.set_class_id(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelforge_core::BoundingBox;
    use pretty_assertions::assert_eq;

    fn bbox(class: &str, id: u32) -> Annotation {
        Annotation::Bbox(BoundingBox::new(0.0, 0.0, 10.0, 10.0, id, class))
    }

    #[test]
    fn test_lexicographic_contiguous_ids() {
        let anns = vec![bbox("car", 7), bbox("person", 3), bbox("bicycle", 9)];
        let table = ClassTable::collect(&anns);
        assert_eq!(table.names(), &["bicycle", "car", "person"]);
        assert_eq!(table.id_of("bicycle"), Some(0));
        assert_eq!(table.id_of("car"), Some(1));
        assert_eq!(table.id_of("person"), Some(2));
        assert_eq!(table.id_of("dog"), None);
    }

    #[test]
    fn test_multi_dataset_unification() {
        // dataset A: ["car", "person"], dataset B: ["person", "bicycle"]
        let mut anns = vec![bbox("car", 0), bbox("person", 1), bbox("person", 0), bbox("bicycle", 1)];
        let table = ClassTable::collect(&anns);
        table.remap(&mut anns);

        assert_eq!(table.names(), &["bicycle", "car", "person"]);
        assert_eq!(anns[0].class_id(), 1); // car
        assert_eq!(anns[1].class_id(), 2); // person
        assert_eq!(anns[2].class_id(), 2); // person
        assert_eq!(anns[3].class_id(), 0); // bicycle
    }

    #[test]
    fn test_empty_table() {
        let table = ClassTable::collect(std::iter::empty());
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }
}
