//! Composable query specification consumed by every store port.
//!
//! A `QuerySpec` is data: a conjunction of conditions plus optional
//! ordering and a row cap. Storage adapters translate it to SQL; the
//! in-memory repository evaluates it directly via [`QuerySpec::matches`].
//! Both sides must agree on semantics, so the rules live here:
//!
//! - name conditions compare exactly (case-sensitive) — they back the
//!   duplicate checks;
//! - `Search` is a case-insensitive substring match over the id rendered
//!   as text, the name, and the code (absent code matches nothing);
//! - `ParentEq` never matches a parentless level (Country).

use std::marker::PhantomData;

use uuid::Uuid;

use crate::entity::ScopedEntity;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    IdEq(Uuid),
    IdNe(Uuid),
    IdIn(Vec<Uuid>),
    IdNotIn(Vec<Uuid>),
    NameEq(String),
    NameIn(Vec<String>),
    ParentEq(Uuid),
    Search(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    Name,
}

#[derive(Debug, Clone)]
pub struct QuerySpec<E> {
    pub conditions: Vec<Condition>,
    pub order_by: Option<OrderBy>,
    pub take: Option<i64>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Default for QuerySpec<E> {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
            order_by: None,
            take: None,
            _entity: PhantomData,
        }
    }
}

impl<E: ScopedEntity> QuerySpec<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_eq(mut self, id: Uuid) -> Self {
        self.conditions.push(Condition::IdEq(id));
        self
    }

    pub fn id_ne(mut self, id: Uuid) -> Self {
        self.conditions.push(Condition::IdNe(id));
        self
    }

    pub fn id_in(mut self, ids: Vec<Uuid>) -> Self {
        self.conditions.push(Condition::IdIn(ids));
        self
    }

    pub fn id_not_in(mut self, ids: Vec<Uuid>) -> Self {
        self.conditions.push(Condition::IdNotIn(ids));
        self
    }

    pub fn name_eq(mut self, name: impl Into<String>) -> Self {
        self.conditions.push(Condition::NameEq(name.into()));
        self
    }

    pub fn name_in(mut self, names: Vec<String>) -> Self {
        self.conditions.push(Condition::NameIn(names));
        self
    }

    pub fn parent_eq(mut self, parent_id: Uuid) -> Self {
        self.conditions.push(Condition::ParentEq(parent_id));
        self
    }

    pub fn search(mut self, needle: impl Into<String>) -> Self {
        self.conditions.push(Condition::Search(needle.into()));
        self
    }

    pub fn order_by_name(mut self) -> Self {
        self.order_by = Some(OrderBy::Name);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    /// In-memory evaluation of the conjunction against one entity.
    pub fn matches(&self, entity: &E) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::IdEq(id) => entity.id() == *id,
            Condition::IdNe(id) => entity.id() != *id,
            Condition::IdIn(ids) => ids.contains(&entity.id()),
            Condition::IdNotIn(ids) => !ids.contains(&entity.id()),
            Condition::NameEq(name) => entity.name() == name,
            Condition::NameIn(names) => names.iter().any(|n| n == entity.name()),
            Condition::ParentEq(parent_id) => entity.parent_id() == Some(*parent_id),
            Condition::Search(needle) => {
                let needle = needle.to_lowercase();
                entity.id().to_string().contains(&needle)
                    || entity.name().to_lowercase().contains(&needle)
                    || entity
                        .code()
                        .map(|code| code.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            }
        })
    }

    /// Filter, order, and cap a slice of rows the way an adapter would.
    pub fn evaluate(&self, rows: &[E]) -> Vec<E> {
        let mut hits: Vec<E> = rows
            .iter()
            .filter(|row| self.matches(row))
            .cloned()
            .collect();
        if let Some(OrderBy::Name) = self.order_by {
            hits.sort_by(|a, b| {
                a.name()
                    .to_lowercase()
                    .cmp(&b.name().to_lowercase())
                    .then_with(|| a.name().cmp(b.name()))
            });
        }
        if let Some(take) = self.take {
            hits.truncate(usize::try_from(take).unwrap_or(0));
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geography::{Country, CountryInput, State, StateInput};

    fn state(name: &str, code: Option<&str>, country_id: Uuid) -> State {
        let mut entity = StateInput {
            name: name.into(),
            code: code.map(Into::into),
            country_id,
            ..Default::default()
        }
        .to_entity();
        entity.id = Uuid::new_v4();
        entity
    }

    #[test]
    fn parent_filter_selects_children() {
        let br = Uuid::new_v4();
        let ar = Uuid::new_v4();
        let rows = vec![
            state("Rio de Janeiro", Some("RJ"), br),
            state("Buenos Aires", Some("BA"), ar),
            state("São Paulo", Some("SP"), br),
        ];
        let hits = QuerySpec::<State>::new().parent_eq(br).evaluate(&rows);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|s| s.country_id == br));
    }

    #[test]
    fn parent_filter_never_matches_a_parentless_level() {
        let rows = vec![CountryInput {
            name: "Brazil".into(),
            ..Default::default()
        }
        .to_entity()];
        let hits = QuerySpec::<Country>::new()
            .parent_eq(Uuid::new_v4())
            .evaluate(&rows);
        assert!(hits.is_empty());
    }

    #[test]
    fn name_equality_is_case_sensitive() {
        let country_id = Uuid::new_v4();
        let rows = vec![state("Bahia", None, country_id)];
        assert_eq!(
            QuerySpec::<State>::new().name_eq("Bahia").evaluate(&rows).len(),
            1
        );
        assert!(QuerySpec::<State>::new()
            .name_eq("bahia")
            .evaluate(&rows)
            .is_empty());
    }

    #[test]
    fn search_is_case_insensitive_over_name_and_code() {
        let country_id = Uuid::new_v4();
        let rows = vec![
            state("Rio de Janeiro", Some("RJ"), country_id),
            state("Minas Gerais", Some("MG"), country_id),
        ];
        let by_name = QuerySpec::<State>::new().search("RIO").evaluate(&rows);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Rio de Janeiro");

        let by_code = QuerySpec::<State>::new().search("mg").evaluate(&rows);
        assert_eq!(by_code.len(), 1);
        assert_eq!(by_code[0].name, "Minas Gerais");
    }

    #[test]
    fn search_matches_the_id_rendered_as_text() {
        let country_id = Uuid::new_v4();
        let target = state("Ceará", None, country_id);
        let fragment = target.id.to_string()[..8].to_string();
        let rows = vec![target.clone(), state("Bahia", None, country_id)];
        let hits = QuerySpec::<State>::new().search(fragment).evaluate(&rows);
        assert!(hits.iter().any(|s| s.id == target.id));
    }

    #[test]
    fn search_skips_rows_without_a_code() {
        let country_id = Uuid::new_v4();
        let rows = vec![state("Bahia", None, country_id)];
        assert!(QuerySpec::<State>::new()
            .search("BA")
            .evaluate(&rows)
            .is_empty());
    }

    #[test]
    fn id_not_in_excludes_only_the_listed_rows() {
        let country_id = Uuid::new_v4();
        let keep = state("Bahia", None, country_id);
        let drop = state("Ceará", None, country_id);
        let rows = vec![keep.clone(), drop.clone()];
        let hits = QuerySpec::<State>::new()
            .id_not_in(vec![drop.id])
            .evaluate(&rows);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, keep.id);
    }

    #[test]
    fn empty_id_in_matches_nothing() {
        let rows = vec![state("Bahia", None, Uuid::new_v4())];
        assert!(QuerySpec::<State>::new().id_in(vec![]).evaluate(&rows).is_empty());
    }

    #[test]
    fn ordering_and_take_compose() {
        let country_id = Uuid::new_v4();
        let rows = vec![
            state("São Paulo", None, country_id),
            state("Bahia", None, country_id),
            state("Minas Gerais", None, country_id),
        ];
        let hits = QuerySpec::<State>::new()
            .order_by_name()
            .take(2)
            .evaluate(&rows);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "Bahia");
        assert_eq!(hits[1].name, "Minas Gerais");
    }

    #[test]
    fn conditions_conjoin() {
        let country_id = Uuid::new_v4();
        let rows = vec![
            state("Bahia", None, country_id),
            state("Bahia", None, Uuid::new_v4()),
        ];
        let hits = QuerySpec::<State>::new()
            .name_eq("Bahia")
            .parent_eq(country_id)
            .evaluate(&rows);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].country_id, country_id);
    }
}
