//! `QuerySpec` → SQL translation.
//!
//! The in-memory evaluation in `georef_core::query` is the semantic
//! reference; everything rendered here must agree with it. Entity tables
//! are always aliased `t` so the same condition fragments work in the
//! summary joins.

use sqlx::{Postgres, QueryBuilder};

use georef_core::query::{Condition, OrderBy, QuerySpec};

use crate::rows::PgEntity;

/// Select list for one entity table, parent column aliased to `parent_id`
/// (`NULL::uuid` for the parentless countries table).
pub fn select_entity_sql<E: PgEntity>() -> String {
    let parent = match E::PARENT_COL {
        Some(col) => format!("t.{col} AS parent_id"),
        None => "NULL::uuid AS parent_id".to_string(),
    };
    format!(
        "SELECT t.id, t.name, t.code, {parent}, t.created_at, t.created_by_id, \
         t.created_by_name, t.updated_at, t.updated_by_id, t.updated_by_name, \
         t.row_version FROM {table} t",
        table = E::TABLE
    )
}

/// Escapes LIKE metacharacters; backslash is the default escape in
/// Postgres, so no ESCAPE clause is needed.
pub fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub fn push_conditions<E: PgEntity>(
    builder: &mut QueryBuilder<'_, Postgres>,
    spec: &QuerySpec<E>,
) {
    builder.push(" WHERE TRUE");
    for condition in &spec.conditions {
        match condition {
            Condition::IdEq(id) => {
                builder.push(" AND t.id = ");
                builder.push_bind(*id);
            }
            Condition::IdNe(id) => {
                builder.push(" AND t.id <> ");
                builder.push_bind(*id);
            }
            Condition::IdIn(ids) => {
                builder.push(" AND t.id = ANY(");
                builder.push_bind(ids.clone());
                builder.push(")");
            }
            Condition::IdNotIn(ids) => {
                builder.push(" AND NOT (t.id = ANY(");
                builder.push_bind(ids.clone());
                builder.push("))");
            }
            Condition::NameEq(name) => {
                builder.push(" AND t.name = ");
                builder.push_bind(name.clone());
            }
            Condition::NameIn(names) => {
                builder.push(" AND t.name = ANY(");
                builder.push_bind(names.clone());
                builder.push(")");
            }
            Condition::ParentEq(parent) => match E::PARENT_COL {
                Some(col) => {
                    builder.push(format!(" AND t.{col} = "));
                    builder.push_bind(*parent);
                }
                // A parentless level can never match a parent filter.
                None => {
                    builder.push(" AND FALSE");
                }
            },
            Condition::Search(needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                builder.push(" AND (t.id::text ILIKE ");
                builder.push_bind(pattern.clone());
                builder.push(" OR t.name ILIKE ");
                builder.push_bind(pattern.clone());
                builder.push(" OR COALESCE(t.code, '') ILIKE ");
                builder.push_bind(pattern);
                builder.push(")");
            }
        }
    }
}

/// `lower(name)` first, exact name as tiebreaker, matching the in-memory
/// sort.
pub fn push_order<E: PgEntity>(builder: &mut QueryBuilder<'_, Postgres>, spec: &QuerySpec<E>) {
    if spec.order_by == Some(OrderBy::Name) {
        builder.push(" ORDER BY lower(t.name), t.name");
    }
}

pub fn push_limit(builder: &mut QueryBuilder<'_, Postgres>, take: Option<i64>) {
    if let Some(take) = take {
        builder.push(" LIMIT ");
        builder.push_bind(take);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georef_core::geography::{Country, State};
    use uuid::Uuid;

    fn render<E: PgEntity>(spec: &QuerySpec<E>) -> String {
        let mut builder = QueryBuilder::new(select_entity_sql::<E>());
        push_conditions(&mut builder, spec);
        push_order(&mut builder, spec);
        push_limit(&mut builder, spec.take);
        builder.sql().to_string()
    }

    #[test]
    fn parent_column_is_aliased_in_the_select_list() {
        assert!(select_entity_sql::<State>().contains("t.country_id AS parent_id"));
        assert!(select_entity_sql::<Country>().contains("NULL::uuid AS parent_id"));
    }

    #[test]
    fn conditions_render_in_order_with_numbered_binds() {
        let spec = QuerySpec::<State>::new()
            .parent_eq(Uuid::new_v4())
            .name_eq("Bahia")
            .id_ne(Uuid::new_v4());
        let sql = render(&spec);
        assert!(sql.contains(" WHERE TRUE AND t.country_id = $1 AND t.name = $2 AND t.id <> $3"));
    }

    #[test]
    fn id_sets_render_as_any_arrays() {
        let spec = QuerySpec::<State>::new()
            .id_in(vec![Uuid::new_v4()])
            .id_not_in(vec![Uuid::new_v4()]);
        let sql = render(&spec);
        assert!(sql.contains(" AND t.id = ANY($1)"));
        assert!(sql.contains(" AND NOT (t.id = ANY($2))"));
    }

    #[test]
    fn parent_filter_on_a_parentless_level_matches_nothing() {
        let spec = QuerySpec::<Country>::new().parent_eq(Uuid::new_v4());
        assert!(render(&spec).contains(" WHERE TRUE AND FALSE"));
    }

    #[test]
    fn search_covers_id_name_and_code() {
        let spec = QuerySpec::<State>::new().search("rio");
        let sql = render(&spec);
        assert!(sql.contains(
            "(t.id::text ILIKE $1 OR t.name ILIKE $2 OR COALESCE(t.code, '') ILIKE $3)"
        ));
    }

    #[test]
    fn order_and_limit_come_last() {
        let spec = QuerySpec::<State>::new().order_by_name().take(5);
        let sql = render(&spec);
        let order_at = sql.find(" ORDER BY lower(t.name), t.name").unwrap();
        let limit_at = sql.find(" LIMIT $1").unwrap();
        assert!(order_at < limit_at);
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_\\"), "50\\%\\_\\\\");
    }
}
