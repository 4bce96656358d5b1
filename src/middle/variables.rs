//! The variable environment: maps source identifiers to addresses and owns
//! the temporary-variable stack used to hold subexpression results.
//!
//! Ported from `duh/compiler/core.py`'s `Variables`/`TVS`. Addresses live in
//! a flat `Vec` indexed by [`VarId`] rather than a name-keyed dict directly,
//! so resolution order (`spec.md` §4.3 step 4: "assign consecutive indices
//! starting immediately after the last instruction") is just "declaration
//! order", with no separate bookkeeping needed.

use crate::common::{Id, Map};
use crate::front::ast::{Node, Program};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

pub struct Variables {
    addresses: Vec<Option<i32>>,
    by_name: Map<Id, VarId>,
    tvs: Tvs,
}

impl Variables {
    /// Collect `var`/`cell` declarations from a program (`spec.md` §4.3 step
    /// 1). `cell` addresses are fixed immediately; `var` stays unresolved
    /// until layout.
    pub fn from_program(program: &Program) -> Self {
        let mut variables =
            Variables { addresses: Vec::new(), by_name: Map::new(), tvs: Tvs::default() };
        for node in &program.0 {
            match node {
                Node::Var { name } => {
                    variables.declare(*name, None);
                }
                Node::Cell { name, address } => {
                    variables.declare(*name, Some(*address as i32));
                }
                _ => {}
            }
        }
        variables
    }

    fn declare(&mut self, name: Id, address: Option<i32>) -> VarId {
        let id = VarId(self.addresses.len());
        self.addresses.push(address);
        self.by_name.insert(name, id);
        id
    }

    /// The address of a declared identifier. Panics if `name` was never
    /// declared with `var`/`cell`; the parser/AST invariant (`spec.md` §3)
    /// guarantees every `Identifier` used in a well-formed program was.
    pub fn address_of(&self, name: Id) -> VarId {
        *self
            .by_name
            .get(&name)
            .unwrap_or_else(|| panic!("identifier `{name}` was never declared"))
    }

    pub fn resolved(&self, id: VarId) -> Option<i32> {
        self.addresses[id.0]
    }

    pub fn resolve(&mut self, id: VarId, address: i32) {
        self.addresses[id.0] = Some(address);
    }

    /// Variables (including temporaries) whose address is still unresolved,
    /// in declaration order.
    pub fn unresolved_in_declaration_order(&self) -> Vec<VarId> {
        (0..self.addresses.len()).filter(|&i| self.addresses[i].is_none()).map(VarId).collect()
    }

    pub fn tvs_push(&mut self) -> VarId {
        self.tvs.push(&mut self.addresses)
    }

    pub fn tvs_pop(&mut self, address: &super::address::Address) {
        if let super::address::Address::Variable(id) = *address {
            self.tvs.pop(id);
        }
    }

    /// The TVS's current stack pointer, exposed only so tests can assert the
    /// balance invariant (`spec.md` §5: "`tvs.active` unchanged across the
    /// lowering of any statement").
    pub fn tvs_active(&self) -> usize {
        self.tvs.active
    }
}

/// Temporary Variable Stack: a monotonically-growing pool of synthetic
/// slots plus a stack pointer (`spec.md` §3). `push` reuses a slot below
/// `active` if one already exists from a deeper expression evaluated
/// earlier; `pop` only moves the pointer back if the given variable is
/// actually one of the pool's own slots, which lets callers pop any operand
/// address uniformly (`spec.md` §4.1).
#[derive(Default)]
struct Tvs {
    pool: Vec<VarId>,
    active: usize,
}

impl Tvs {
    fn push(&mut self, addresses: &mut Vec<Option<i32>>) -> VarId {
        if self.active == self.pool.len() {
            let id = VarId(addresses.len());
            addresses.push(None);
            self.pool.push(id);
        }
        let id = self.pool[self.active];
        self.active += 1;
        id
    }

    fn pop(&mut self, id: VarId) {
        if self.pool.contains(&id) {
            self.active -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tvs_reuses_slots_below_the_active_pointer() {
        let mut addresses = Vec::new();
        let mut tvs = Tvs::default();
        let a = tvs.push(&mut addresses);
        tvs.pop(a);
        let b = tvs.push(&mut addresses);
        assert_eq!(a, b);
        assert_eq!(addresses.len(), 1);
    }

    #[test]
    fn tvs_grows_when_nested_deeper_than_ever_before() {
        let mut addresses = Vec::new();
        let mut tvs = Tvs::default();
        let a = tvs.push(&mut addresses);
        let b = tvs.push(&mut addresses);
        assert_ne!(a, b);
        assert_eq!(addresses.len(), 2);
    }
}
