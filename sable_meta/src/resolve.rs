//! Overload resolution.
//!
//! Given a method table snapshot, a receiver class and the runtime argument
//! types, pick the single most specific applicable overload or fail with a
//! typed error.
//!
//! # Design
//!
//! Every applicable candidate gets a *distance vector*: one leading varargs
//! penalty component followed by a per-argument conversion cost. Vectors are
//! all the same length for a given call, so candidates compare
//! lexicographically. The unique minimum wins; ties fall back to
//! declaring-class specificity (the candidate declared nearest the receiver),
//! and anything still tied is an ambiguity error. Access is checked on the
//! *selected* winner only; a private winner is an `AccessDenied` error, never
//! a reason to try the next-best overload.
//!
//! Conversion costs (per argument):
//!
//! | conversion                        | cost                 |
//! |-----------------------------------|----------------------|
//! | exact primitive or same class     | 0                    |
//! | int to float widening             | 1                    |
//! | reference upcast                  | 2 per hierarchy step |
//! | primitive boxing                  | 2, plus upcast steps |
//! | null to `Object` / other ref      | 1 / 2                |

use std::sync::Arc;

use sable_core::error::{DispatchError, DispatchResult};
use sable_core::intern::Symbol;
use sable_core::value::{ClassId, TypeKey};
use smallvec::SmallVec;

use crate::hierarchy::Hierarchy;
use crate::metadata::MethodTable;
use crate::method::{ParamType, ReflectedMethod};

const WIDENING: u32 = 1;
const BOXING: u32 = 2;
const UPCAST_STEP: u32 = 2;

type Distances = SmallVec<[u32; 6]>;

/// Stateless overload resolver over a class hierarchy.
pub struct Resolver {
    hierarchy: Arc<Hierarchy>,
}

impl Resolver {
    /// Create a resolver against the given hierarchy.
    #[must_use]
    pub fn new(hierarchy: Arc<Hierarchy>) -> Self {
        Self { hierarchy }
    }

    /// Resolve an instance-method call.
    pub fn resolve_instance(
        &self,
        table: &MethodTable,
        receiver_class: ClassId,
        name: &Symbol,
        arg_types: &[TypeKey],
    ) -> DispatchResult<ReflectedMethod> {
        self.resolve_filtered(table, receiver_class, name, arg_types, false)
    }

    /// Resolve a static-method call on a class.
    pub fn resolve_static(
        &self,
        table: &MethodTable,
        class: ClassId,
        name: &Symbol,
        arg_types: &[TypeKey],
    ) -> DispatchResult<ReflectedMethod> {
        self.resolve_filtered(table, class, name, arg_types, true)
    }

    fn resolve_filtered(
        &self,
        table: &MethodTable,
        receiver_class: ClassId,
        name: &Symbol,
        arg_types: &[TypeKey],
        want_static: bool,
    ) -> DispatchResult<ReflectedMethod> {
        let mut best: Vec<(ReflectedMethod, Distances)> = Vec::new();

        for candidate in table.methods_named(name) {
            if candidate.modifiers().is_static() != want_static {
                continue;
            }
            let Some(distances) = self.distances_for(candidate, arg_types) else {
                continue;
            };
            let ord = match best.first() {
                None => std::cmp::Ordering::Less,
                Some((_, current)) => distances.as_slice().cmp(current.as_slice()),
            };
            match ord {
                std::cmp::Ordering::Less => {
                    best.clear();
                    best.push((candidate.clone(), distances));
                }
                std::cmp::Ordering::Equal => best.push((candidate.clone(), distances)),
                std::cmp::Ordering::Greater => {}
            }
        }

        if best.is_empty() {
            return Err(DispatchError::no_such_method(
                name.as_str(),
                self.hierarchy.display_name(receiver_class),
                self.format_args(arg_types),
            ));
        }
        let winner = if best.len() == 1 {
            Some(best[0].0.clone())
        } else {
            self.break_tie(receiver_class, &best)
        };

        let Some(winner) = winner else {
            return Err(DispatchError::ambiguous(
                name.as_str(),
                self.hierarchy.display_name(receiver_class),
                self.format_args(arg_types),
                best.iter()
                    .map(|(m, _)| m.describe())
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        };

        if winner.modifiers().is_private() {
            return Err(DispatchError::access_denied(
                name.as_str(),
                self.hierarchy.display_name(winner.declaring()),
            ));
        }
        Ok(winner)
    }

    /// Declaring-class specificity tiebreak: the unique candidate declared
    /// nearest the receiver wins.
    fn break_tie(
        &self,
        receiver_class: ClassId,
        tied: &[(ReflectedMethod, Distances)],
    ) -> Option<ReflectedMethod> {
        let mut winner: Option<(&ReflectedMethod, u32)> = None;
        let mut unique = true;
        for (candidate, _) in tied {
            let depth = self
                .hierarchy
                .supertype_distance(receiver_class, candidate.declaring())
                .unwrap_or(u32::MAX);
            match winner {
                None => winner = Some((candidate, depth)),
                Some((_, best_depth)) => {
                    if depth < best_depth {
                        winner = Some((candidate, depth));
                        unique = true;
                    } else if depth == best_depth {
                        unique = false;
                    }
                }
            }
        }
        match winner {
            Some((m, _)) if unique => Some(m.clone()),
            _ => None,
        }
    }

    /// Distance vector for one candidate, or `None` when inapplicable.
    ///
    /// Vectors are `1 + arg_types.len()` long: the leading component is the
    /// varargs penalty (zero for fixed-arity methods, one plus the surplus
    /// argument count otherwise), so any fixed-arity match beats any varargs
    /// match and shorter collections beat longer ones.
    fn distances_for(
        &self,
        candidate: &ReflectedMethod,
        arg_types: &[TypeKey],
    ) -> Option<Distances> {
        let params = candidate.params();
        let mut distances = Distances::with_capacity(1 + arg_types.len());

        if candidate.is_varargs() {
            let fixed = params.len().checked_sub(1)?;
            if arg_types.len() < fixed {
                return None;
            }
            let extra = (arg_types.len() - fixed) as u32;
            distances.push(1 + extra);
            for (param, arg) in params[..fixed].iter().zip(arg_types) {
                distances.push(self.arg_distance(*param, *arg)?);
            }
            let element = params[fixed];
            for arg in &arg_types[fixed..] {
                distances.push(self.arg_distance(element, *arg)?);
            }
        } else {
            if params.len() != arg_types.len() {
                return None;
            }
            distances.push(0);
            for (param, arg) in params.iter().zip(arg_types) {
                distances.push(self.arg_distance(*param, *arg)?);
            }
        }
        Some(distances)
    }

    /// Conversion cost of passing an `arg` where `param` is declared.
    fn arg_distance(&self, param: ParamType, arg: TypeKey) -> Option<u32> {
        match (param, arg) {
            (ParamType::Int, TypeKey::Int)
            | (ParamType::Float, TypeKey::Float)
            | (ParamType::Bool, TypeKey::Bool) => Some(0),
            (ParamType::Float, TypeKey::Int) => Some(WIDENING),
            (ParamType::Int | ParamType::Float | ParamType::Bool, _) => None,
            (ParamType::Ref(target), TypeKey::Null) => Some(if target == ClassId::NULL {
                0
            } else if target == ClassId::OBJECT {
                1
            } else {
                2
            }),
            (ParamType::Ref(target), TypeKey::Str) => self.upcast_cost(ClassId::STRING, target),
            (ParamType::Ref(target), TypeKey::Object(source)) => {
                self.upcast_cost(source, target)
            }
            (ParamType::Ref(target), TypeKey::Int) => self.boxing_cost(ClassId::INT, target),
            (ParamType::Ref(target), TypeKey::Float) => self.boxing_cost(ClassId::FLOAT, target),
            (ParamType::Ref(target), TypeKey::Bool) => self.boxing_cost(ClassId::BOOL, target),
        }
    }

    fn upcast_cost(&self, source: ClassId, target: ClassId) -> Option<u32> {
        self.hierarchy
            .supertype_distance(source, target)
            .map(|steps| steps * UPCAST_STEP)
    }

    fn boxing_cost(&self, boxed: ClassId, target: ClassId) -> Option<u32> {
        self.hierarchy
            .supertype_distance(boxed, target)
            .map(|steps| BOXING + steps * UPCAST_STEP)
    }

    fn format_args(&self, arg_types: &[TypeKey]) -> String {
        arg_types
            .iter()
            .map(|t| self.type_name(*t))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn type_name(&self, key: TypeKey) -> String {
        match key {
            TypeKey::Null => "null".to_owned(),
            TypeKey::Bool => "bool".to_owned(),
            TypeKey::Int => "int".to_owned(),
            TypeKey::Float => "float".to_owned(),
            TypeKey::Str => "String".to_owned(),
            TypeKey::Object(class) => self.hierarchy.display_name(class),
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::MemberCache;
    use crate::method::{Modifiers, NativeFn, RawMethod};
    use sable_core::intern::intern;
    use sable_core::value::Value;
    use smallvec::{smallvec, SmallVec};

    struct Fixture {
        hierarchy: Arc<Hierarchy>,
        members: Arc<MemberCache>,
        resolver: Resolver,
    }

    impl Fixture {
        fn new() -> Self {
            let hierarchy = Arc::new(Hierarchy::new());
            Self {
                members: Arc::new(MemberCache::new()),
                resolver: Resolver::new(Arc::clone(&hierarchy)),
                hierarchy,
            }
        }

        fn body() -> NativeFn {
            Arc::new(|_, _| Ok(Value::Null))
        }

        fn add(
            &self,
            class: ClassId,
            name: &str,
            params: SmallVec<[ParamType; 4]>,
            modifiers: Modifiers,
        ) {
            self.members
                .register(
                    &self.hierarchy,
                    RawMethod {
                        name: intern(name),
                        params,
                        ret: ParamType::OBJECT,
                        declaring: class,
                        modifiers,
                        body: Self::body(),
                    },
                )
                .unwrap();
        }

        fn table(&self, class: ClassId) -> MethodTable {
            MethodTable::build(class, &self.hierarchy, &self.members)
        }
    }

    #[test]
    fn test_exact_match_beats_widening() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "f", smallvec![ParamType::Int], Modifiers::PUBLIC);
        fx.add(c, "f", smallvec![ParamType::Float], Modifiers::PUBLIC);

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Int])
            .unwrap();
        assert_eq!(m.params(), &[ParamType::Int]);
    }

    #[test]
    fn test_widening_applies_when_no_exact() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "f", smallvec![ParamType::Float], Modifiers::PUBLIC);

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Int])
            .unwrap();
        assert_eq!(m.params(), &[ParamType::Float]);
    }

    #[test]
    fn test_string_overload_beats_object() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "f", smallvec![ParamType::OBJECT], Modifiers::PUBLIC);
        fx.add(c, "f", smallvec![ParamType::STRING], Modifiers::PUBLIC);

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Str])
            .unwrap();
        assert_eq!(m.params(), &[ParamType::STRING]);
    }

    #[test]
    fn test_null_never_selects_primitive() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "f", smallvec![ParamType::Int], Modifiers::PUBLIC);
        fx.add(c, "f", smallvec![ParamType::STRING], Modifiers::PUBLIC);

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Null])
            .unwrap();
        assert_eq!(m.params(), &[ParamType::STRING]);
    }

    #[test]
    fn test_null_prefers_object_over_specific_ref() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "f", smallvec![ParamType::OBJECT], Modifiers::PUBLIC);
        fx.add(c, "f", smallvec![ParamType::STRING], Modifiers::PUBLIC);

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Null])
            .unwrap();
        assert_eq!(m.params(), &[ParamType::OBJECT]);
    }

    #[test]
    fn test_nearest_upcast_wins() {
        let fx = Fixture::new();
        let animal = fx.hierarchy.register("Animal", None);
        let dog = fx.hierarchy.register("Dog", Some(animal));
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "pet", smallvec![ParamType::Ref(animal)], Modifiers::PUBLIC);
        fx.add(c, "pet", smallvec![ParamType::OBJECT], Modifiers::PUBLIC);

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("pet"), &[TypeKey::Object(dog)])
            .unwrap();
        assert_eq!(m.params(), &[ParamType::Ref(animal)]);
    }

    #[test]
    fn test_fixed_arity_beats_varargs() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "f", smallvec![ParamType::Int], Modifiers::PUBLIC);
        fx.add(
            c,
            "f",
            smallvec![ParamType::Int],
            Modifiers::PUBLIC.with(Modifiers::VARARGS),
        );

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Int])
            .unwrap();
        assert!(!m.is_varargs());
    }

    #[test]
    fn test_varargs_fewer_surplus_wins() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        // f(int, int...) vs f(int...): two int args collect one surplus in
        // the first, two in the second.
        fx.add(
            c,
            "f",
            smallvec![ParamType::Int, ParamType::Int],
            Modifiers::PUBLIC.with(Modifiers::VARARGS),
        );
        fx.add(
            c,
            "f",
            smallvec![ParamType::Int],
            Modifiers::PUBLIC.with(Modifiers::VARARGS),
        );

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Int, TypeKey::Int])
            .unwrap();
        assert_eq!(m.params().len(), 2);
    }

    #[test]
    fn test_varargs_collects_zero_args() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(
            c,
            "f",
            smallvec![ParamType::Int],
            Modifiers::PUBLIC.with(Modifiers::VARARGS),
        );

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[])
            .unwrap();
        assert!(m.is_varargs());
    }

    #[test]
    fn test_no_such_method() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        let table = fx.table(c);
        let err = fx
            .resolver
            .resolve_instance(&table, c, &intern("missing"), &[TypeKey::Int])
            .unwrap_err();
        assert!(err.is_resolution_miss());
        assert!(err.to_string().contains("missing"));
        assert!(err.to_string().contains("(int)"));
    }

    #[test]
    fn test_wrong_arity_is_no_such_method() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "f", smallvec![ParamType::Int], Modifiers::PUBLIC);

        let table = fx.table(c);
        let err = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Int, TypeKey::Int])
            .unwrap_err();
        assert!(err.is_resolution_miss());
    }

    #[test]
    fn test_ambiguous_call_reported() {
        let fx = Fixture::new();
        let a = fx.hierarchy.register_interface("A", &[]);
        let b = fx.hierarchy.register_interface("B", &[]);
        let c = fx.hierarchy.register("C", None);
        let arg = fx.hierarchy.register_with("Both", None, &[a, b]);
        fx.add(c, "f", smallvec![ParamType::Ref(a)], Modifiers::PUBLIC);
        fx.add(c, "f", smallvec![ParamType::Ref(b)], Modifiers::PUBLIC);

        let table = fx.table(c);
        let err = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Object(arg)])
            .unwrap_err();
        assert!(matches!(err, DispatchError::AmbiguousMethod { .. }));
    }

    #[test]
    fn test_override_resolves_to_nearest_declaration() {
        let fx = Fixture::new();
        let base = fx.hierarchy.register("Base", None);
        let derived = fx.hierarchy.register("Derived", Some(base));
        fx.add(base, "f", smallvec![ParamType::OBJECT], Modifiers::PUBLIC);
        fx.add(derived, "f", smallvec![ParamType::OBJECT], Modifiers::PUBLIC);

        let table = fx.table(derived);
        let m = fx
            .resolver
            .resolve_instance(&table, derived, &intern("f"), &[TypeKey::Str])
            .unwrap();
        assert_eq!(m.declaring(), derived);
    }

    #[test]
    fn test_private_winner_is_access_denied() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "secret", smallvec![ParamType::Int], Modifiers::PRIVATE);
        fx.add(c, "secret", smallvec![ParamType::Float], Modifiers::PUBLIC);

        // The private overload is the best match; resolution must fail
        // rather than fall through to the public one.
        let table = fx.table(c);
        let err = fx
            .resolver
            .resolve_instance(&table, c, &intern("secret"), &[TypeKey::Int])
            .unwrap_err();
        assert!(matches!(err, DispatchError::AccessDenied { .. }));
    }

    #[test]
    fn test_static_and_instance_pools_are_disjoint() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "make", smallvec![], Modifiers::STATIC);

        let table = fx.table(c);
        assert!(fx
            .resolver
            .resolve_instance(&table, c, &intern("make"), &[])
            .is_err());
        assert!(fx
            .resolver
            .resolve_static(&table, c, &intern("make"), &[])
            .is_ok());
    }

    #[test]
    fn test_boxing_costs_more_than_widening() {
        let fx = Fixture::new();
        let c = fx.hierarchy.register("C", None);
        fx.add(c, "f", smallvec![ParamType::Float], Modifiers::PUBLIC);
        fx.add(c, "f", smallvec![ParamType::OBJECT], Modifiers::PUBLIC);

        let table = fx.table(c);
        let m = fx
            .resolver
            .resolve_instance(&table, c, &intern("f"), &[TypeKey::Int])
            .unwrap();
        assert_eq!(m.params(), &[ParamType::Float]);
    }
}
