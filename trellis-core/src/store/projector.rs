//! State projection.
//!
//! Turns either declaration style into the flat field map a [`Store`] exposes,
//! plus the slice of it that is mirrored into the shared state tree. Nothing is
//! written to the registry here; the builder commits the result.

use indexmap::IndexMap;
use serde_json::Value;

use super::descriptor::{check_name, OptionsStore, SetupFn};
use super::field::StoreField;
use super::instance::Store;
use crate::error::{json_kind, Result, StoreError};
use crate::reactive::{Memo, Signal};
use crate::registry::{SliceWrite, StateEntry, StateSlice};

pub(crate) struct Projection {
    pub(crate) fields: IndexMap<String, StoreField>,
    pub(crate) slice: StateSlice,
    pub(crate) write: SliceWrite,
}

fn collision(id: &str, field: &str) -> StoreError {
    StoreError::FieldCollision {
        id: id.to_owned(),
        field: field.to_owned(),
    }
}

/// Options style: state fields, then getters, then actions.
///
/// `store` is the still-empty shell; getters and actions hold it weakly and
/// resolve it when they run.
pub(crate) fn project_options(id: &str, options: &OptionsStore, store: &Store) -> Result<Projection> {
    options.validate(id)?;

    let mut fields = IndexMap::new();
    let mut slice = StateSlice::new();

    if let Some(init) = options.state_fn() {
        let state = match init()? {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::InvalidState {
                    id: id.to_owned(),
                    found: json_kind(&other),
                })
            }
        };
        for (name, value) in state {
            check_name(id, &name)?;
            let signal = Signal::new(value);
            slice.insert(name.clone(), StateEntry::Ref(signal.clone()));
            fields.insert(name, StoreField::Ref(signal));
        }
    }

    for (name, getter) in options.getters() {
        if fields.contains_key(name) {
            return Err(collision(id, name));
        }
        let getter = getter.clone();
        let weak = store.downgrade();
        let memo = Memo::new(move || match weak.upgrade() {
            Some(store) => getter(&store),
            None => Value::Null,
        });
        fields.insert(name.clone(), StoreField::Computed(memo));
    }

    for (name, action) in options.actions() {
        if fields.contains_key(name) {
            return Err(collision(id, name));
        }
        fields.insert(name.clone(), StoreField::Action(action.bind(name, store.downgrade())));
    }

    Ok(Projection {
        fields,
        slice,
        write: SliceWrite::Replace,
    })
}

/// Setup style: run the function and mirror its plain references and reactive
/// objects. Computed values, actions and plain data stay off the tree.
pub(crate) fn project_setup(id: &str, setup: &SetupFn) -> Result<Projection> {
    let (fields, duplicates) = setup()?.into_parts();
    if let Some(name) = duplicates.first() {
        return Err(collision(id, name));
    }

    let mut slice = StateSlice::new();
    for (name, field) in &fields {
        check_name(id, name)?;
        match field {
            StoreField::Ref(signal) => slice.insert(name.clone(), StateEntry::Ref(signal.clone())),
            StoreField::Reactive(object) => {
                slice.insert(name.clone(), StateEntry::Reactive(object.clone()))
            }
            StoreField::Computed(_) | StoreField::Action(_) | StoreField::Plain(_) => {}
        }
    }

    Ok(Projection {
        fields,
        slice,
        write: SliceWrite::Merge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    use crate::reactive::{EffectScope, ReactiveObject};
    use crate::store::descriptor::SetupStore;
    use crate::store::field::Action;
    use crate::store::instance::DefinitionId;

    fn shell(id: &str) -> Store {
        Store::shell(id, EffectScope::detached(), DefinitionId::next(), None)
    }

    #[test]
    fn options_state_is_mirrored_by_reference() {
        let options = OptionsStore::new()
            .state(|| json!({"count": 0}))
            .getter("double", |s| json!(s.get_as::<i64>("count").unwrap_or(0) * 2));

        let projection = project_options("counter", &options, &shell("counter")).unwrap();
        assert_eq!(projection.write, SliceWrite::Replace);
        assert_eq!(projection.slice.to_value(), json!({"count": 0}));

        let (Some(StoreField::Ref(field)), Some(StateEntry::Ref(mirrored))) =
            (projection.fields.get("count"), projection.slice.get("count"))
        else {
            panic!("count should be a reference in both places");
        };
        assert!(field.ptr_eq(mirrored));
        assert!(projection.fields["double"].is_computed());
    }

    #[test]
    fn state_and_getter_names_collide() {
        let options = OptionsStore::new()
            .state(|| json!({"total": 1}))
            .getter("total", |_| json!(2));

        assert!(matches!(
            project_options("cart", &options, &shell("cart")),
            Err(StoreError::FieldCollision { field, .. }) if field == "total"
        ));
    }

    #[test]
    fn state_must_be_an_object() {
        let options = OptionsStore::new().state(|| json!([1, 2, 3]));
        assert!(matches!(
            project_options("list", &options, &shell("list")),
            Err(StoreError::InvalidState { found: "an array", .. })
        ));
    }

    #[test]
    fn setup_classification_uses_the_field_tag() {
        let setup: SetupFn = Arc::new(|| {
            Ok(SetupStore::new()
                .signal("a", Signal::new(json!(1)))
                .computed("b", Memo::new(|| json!(2)))
                .action("c", Action::new(|_| Ok(Value::Null)))
                .reactive("d", ReactiveObject::from_value(json!({"x": 1})).unwrap()))
        });

        let projection = project_setup("mixed", &setup).unwrap();
        assert_eq!(projection.write, SliceWrite::Merge);
        assert_eq!(projection.fields.len(), 4);
        assert_eq!(projection.slice.keys().collect::<Vec<_>>(), vec!["a", "d"]);
    }

    #[test]
    fn setup_errors_propagate_unchanged() {
        let setup: SetupFn = Arc::new(|| Err(StoreError::failed("backend unavailable")));
        match project_setup("remote", &setup) {
            Err(StoreError::Failed(err)) => assert_eq!(err.to_string(), "backend unavailable"),
            other => panic!("unexpected {:?}", other.map(|p| p.fields)),
        }
    }
}
