#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **schemat-schema** – the declarative type system schema fields are
//! described with: validation, inheritance merge, and imputation
//! (spec §4.B).

mod error;
mod options;
mod schema;
mod type_;

pub use error::{SchemaError, SchemaResult};
pub use options::{FieldOptions, Impute};
pub use schema::{Schema, SchemaField};
pub use type_::{FixedWidth, ImputeHost, IntWidth, Type, TypeKind};

#[cfg(test)]
mod tests {
    use super::*;
    use schemat_catalog::Value;

    struct NoImpute;
    impl ImputeHost for NoImpute {
        fn invoke_impute(&self, _method: &str) -> Option<Value> {
            None
        }
    }

    #[test]
    fn validate_is_idempotent() {
        let ty = Type::new(TypeKind::String { min_len: None, max_len: None });
        let value = Value::String("hello".into());
        let once = ty.validate("name", &value).unwrap();
        let twice = ty.validate("name", &once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn array_validate_recurses_into_items() {
        let ty = Type::new(TypeKind::Array(Box::new(Type::new(TypeKind::Integer {
            signed: true,
            width: IntWidth::Adaptive,
        }))));
        let value = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(ty.validate("xs", &value).unwrap(), value);

        let bad = Value::List(vec![Value::Int(1), Value::String("oops".into())]);
        assert!(ty.validate("xs", &bad).is_err());
    }

    #[test]
    fn inheritance_merge_matches_tags_scenario() {
        // Category K: tags ARRAY(STRING), multiple=true. Own=["x"],
        // prototype=["y","z"], category default=["d"].
        let mut opts = FieldOptions::default();
        opts.multiple = true;
        let ty = Type::new(TypeKind::Array(Box::new(Type::new(TypeKind::String {
            min_len: None,
            max_len: None,
        }))))
        .with_options(opts);

        let own = vec![Value::String("x".into())];
        let prototype = vec![Value::String("y".into()), Value::String("z".into())];
        let category_default = vec![Value::String("d".into())];

        let resolved = ty.combine_inherited("tags", &[own, prototype, category_default], &NoImpute).unwrap();
        let resolved: Vec<&str> = resolved.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(resolved, vec!["x", "y", "z", "d"]);
    }

    #[test]
    fn non_inherited_field_ignores_ancestors() {
        let mut opts = FieldOptions::default();
        opts.inherited = false;
        let ty = Type::new(TypeKind::String { min_len: None, max_len: None }).with_options(opts);
        let mut opts_multi = ty.options.clone();
        opts_multi.multiple = true;
        let ty = ty.with_options(opts_multi);

        let own = vec![Value::String("own".into())];
        let prototype = vec![Value::String("inherited".into())];
        let resolved = ty.combine_inherited("field", &[own, prototype], &NoImpute).unwrap();
        assert_eq!(resolved, vec![Value::String("own".into())]);
    }

    #[test]
    fn mergeable_singular_field_merges_catalogs() {
        let mut opts = FieldOptions::default();
        opts.mergeable = true;
        let ty = Type::new(TypeKind::Object).with_options(opts);

        let mut own = schemat_catalog::Catalog::new();
        own.push(Some("a".into()), Value::Int(1));
        let mut inherited = schemat_catalog::Catalog::new();
        inherited.push(Some("a".into()), Value::Int(99));
        inherited.push(Some("b".into()), Value::Int(2));

        let resolved = ty
            .combine_inherited("field", &[vec![Value::Catalog(own)], vec![Value::Catalog(inherited)]], &NoImpute)
            .unwrap();
        assert_eq!(resolved.len(), 1);
        let merged = resolved[0].as_catalog().unwrap();
        assert_eq!(merged.get("a").unwrap(), Some(&Value::Int(1)));
        assert_eq!(merged.get("b").unwrap(), Some(&Value::Int(2)));
    }

    #[test]
    fn impute_runs_when_no_candidates_exist() {
        struct FixedImpute;
        impl ImputeHost for FixedImpute {
            fn invoke_impute(&self, method: &str) -> Option<Value> {
                (method == "default_name").then(|| Value::String("anon".into()))
            }
        }
        let mut opts = FieldOptions::default();
        opts.impute = Some(Impute::Method("default_name".into()));
        let ty = Type::new(TypeKind::String { min_len: None, max_len: None }).with_options(opts);
        let resolved = ty.combine_inherited("name", &[], &FixedImpute).unwrap();
        assert_eq!(resolved, vec![Value::String("anon".into())]);
    }

    #[test]
    fn signed_integer_binary_round_trips() {
        let ty = Type::new(TypeKind::Integer { signed: true, width: IntWidth::Adaptive });
        let encoded = ty.write_binary(&Value::Int(-42)).unwrap();
        assert_eq!(ty.read_binary(&encoded).unwrap(), Value::Int(-42));
    }
}
