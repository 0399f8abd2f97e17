/*!
The learned-nogood store and the template grounder.

The [NogoodStore] deduplicates learned ground nogoods and nonground
templates, tracks per-entry use counts, and forgets the least frequently
used ground entries when a budget is exceeded. Templates are kept
unconditionally: they are few (one per generalised learning event) and
cheap.

The [NogoodGrounder] instantiates nonground templates against a live
assignment by matching their nonground literals over the interned ground
atoms.
*/

use std::collections::{HashMap, HashSet};

use crate::misc::log::targets;
use crate::registry::Registry;
use crate::structures::{Id, Interpretation, Lit, Nogood, NogoodTemplate};

/// A deduplicated set of nogoods with ages for forgetting.
#[derive(Debug, Default)]
pub struct NogoodStore {
    ground: Vec<Nogood>,
    ground_index: HashSet<Nogood>,
    uses: Vec<u64>,

    templates: Vec<NogoodTemplate>,
    template_index: HashSet<NogoodTemplate>,

    /// Ground nogoods kept before forgetting; zero is unbounded.
    pub budget: usize,
}

impl NogoodStore {
    pub fn new(budget: usize) -> Self {
        NogoodStore {
            budget,
            ..NogoodStore::default()
        }
    }

    /// Admit a ground nogood. Returns true if it was fresh.
    pub fn add_ground(&mut self, nogood: Nogood) -> bool {
        if nogood.is_vacuous() || self.ground_index.contains(&nogood) {
            return false;
        }
        self.ground_index.insert(nogood.clone());
        self.ground.push(nogood);
        self.uses.push(1);

        if self.budget > 0 && self.ground.len() > self.budget {
            self.forget();
        }
        true
    }

    /// Admit a template. Ground templates are redirected to the ground
    /// store through `translate`.
    pub fn add_template(&mut self, template: NogoodTemplate) -> bool {
        if template.is_ground() {
            return self.add_ground(translate(&template));
        }
        if self.template_index.contains(&template) {
            return false;
        }
        self.template_index.insert(template.clone());
        self.templates.push(template);
        true
    }

    /// Note a use of the ground nogood at `index`.
    pub fn note_use(&mut self, index: usize) {
        self.uses[index] += 1;
    }

    pub fn ground(&self) -> &[Nogood] {
        &self.ground
    }

    pub fn templates(&self) -> &[NogoodTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.ground.len() + self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ground.is_empty() && self.templates.is_empty()
    }

    /// Write the ground store, one nogood per line in the canonical form
    /// `{±p(a,b),…}`.
    pub fn dump<W: std::io::Write>(
        &self,
        registry: &Registry,
        writer: &mut W,
    ) -> std::io::Result<()> {
        for nogood in &self.ground {
            writeln!(writer, "{}", registry.nogood_text(nogood))?;
        }
        Ok(())
    }

    /// Drop the least frequently used half of the ground store.
    fn forget(&mut self) {
        let mut order: Vec<usize> = (0..self.ground.len()).collect();
        order.sort_by_key(|index| self.uses[*index]);
        let forgotten: HashSet<usize> =
            order.into_iter().take(self.ground.len() / 2).collect();

        let mut kept = Vec::with_capacity(self.ground.len() - forgotten.len());
        let mut kept_uses = Vec::with_capacity(kept.capacity());
        for (index, nogood) in self.ground.drain(..).enumerate() {
            if forgotten.contains(&index) {
                self.ground_index.remove(&nogood);
            } else {
                kept.push(nogood);
                kept_uses.push(self.uses[index]);
            }
        }
        self.ground = kept;
        self.uses = kept_uses;

        log::info!(target: targets::NOGOOD_DB, "Forgot {} nogoods", forgotten.len());
    }
}

/// A ground template as a solver nogood. The addresses of ground literal
/// ids coincide with solver atom addresses.
pub fn translate(template: &NogoodTemplate) -> Nogood {
    Nogood::new(template.literals.iter().map(|literal| {
        let atom = Id::atom_of(*literal);
        Lit::new(atom.address, !literal.is_naf())
    }))
}

/// Instantiates nonground templates against a live assignment.
#[derive(Debug, Default)]
pub struct NogoodGrounder {
    /// Templates already instantiated, by (template, ground instance).
    exhausted: HashSet<(NogoodTemplate, Nogood)>,
}

impl NogoodGrounder {
    pub fn new() -> Self {
        NogoodGrounder::default()
    }

    /// Instantiate every template of `store` whose positive nonground
    /// literals match atoms of `relevant`, returning fresh ground
    /// instances.
    pub fn instantiate(
        &mut self,
        registry: &Registry,
        store: &NogoodStore,
        relevant: &Interpretation,
    ) -> Vec<Nogood> {
        let mut fresh = Vec::new();

        for template in store.templates() {
            let mut bindings: Vec<HashMap<Id, Id>> = vec![HashMap::new()];

            for literal in &template.literals {
                let atom_id = Id::atom_of(*literal);
                if atom_id.is_ordinary_ground_atom() {
                    continue;
                }
                let pattern = registry.ordinary_atom(atom_id).tuple.clone();

                // A variable in predicate position (from name-irrelevant
                // generalisation) matches any relevant atom of the arity.
                let candidates: Vec<crate::structures::AtomAddress> =
                    if pattern[0].is_variable_term() {
                        relevant
                            .iter_true()
                            .filter(|atom| {
                                registry.ground_atom(*atom).tuple.len() == pattern.len()
                            })
                            .collect()
                    } else {
                        registry
                            .ground_atoms_of(pattern[0])
                            .iter()
                            .map(|id| id.address)
                            .filter(|address| relevant.test(*address))
                            .collect()
                    };

                let mut extended = Vec::new();
                for binding in bindings {
                    for candidate in &candidates {
                        let tuple = &registry.ground_atom(*candidate).tuple;
                        if let Some(revised) = unify(registry, &pattern, tuple, &binding) {
                            extended.push(revised);
                        }
                    }
                }
                bindings = extended;
                if bindings.is_empty() {
                    break;
                }
            }

            for binding in bindings {
                if let Some(instance) = ground_with(registry, template, &binding) {
                    let tag = (template.clone(), instance.clone());
                    if self.exhausted.insert(tag) {
                        fresh.push(instance);
                    }
                }
            }
        }

        fresh
    }
}

/// Extend `binding` to match `pattern` against the ground `tuple`.
fn unify(
    registry: &Registry,
    pattern: &[Id],
    tuple: &[Id],
    binding: &HashMap<Id, Id>,
) -> Option<HashMap<Id, Id>> {
    if pattern.len() != tuple.len() {
        return None;
    }
    let mut revised = binding.clone();
    for (pattern_term, ground_term) in pattern.iter().zip(tuple.iter()) {
        if pattern_term.is_variable_term() {
            match revised.get(pattern_term) {
                Some(bound) if bound != ground_term => return None,
                Some(_) => {}
                None => {
                    revised.insert(*pattern_term, *ground_term);
                }
            }
        } else if registry.term_is_ground(*pattern_term) {
            if pattern_term != ground_term {
                return None;
            }
        } else {
            // Nested nonground patterns are not produced by learning.
            return None;
        }
    }
    Some(revised)
}

/// The ground instance of `template` under a complete `binding`, if every
/// literal grounds to an interned atom.
fn ground_with(
    registry: &Registry,
    template: &NogoodTemplate,
    binding: &HashMap<Id, Id>,
) -> Option<Nogood> {
    let mut literals = Vec::with_capacity(template.literals.len());
    for literal in &template.literals {
        let atom_id = Id::atom_of(*literal);
        let address = if atom_id.is_ordinary_ground_atom() {
            atom_id.address
        } else {
            let tuple: Option<Vec<Id>> = registry
                .ordinary_atom(atom_id)
                .tuple
                .iter()
                .map(|term| {
                    if term.is_variable_term() {
                        binding.get(term).copied()
                    } else {
                        Some(*term)
                    }
                })
                .collect();
            registry.ground_atom_id(&tuple?)?.address
        };
        literals.push(Lit::new(address, !literal.is_naf()));
    }
    Some(Nogood::new(literals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_deduplicates() {
        let mut store = NogoodStore::new(0);
        let nogood = Nogood::new([Lit::positive(1), Lit::negative(2)]);

        assert!(store.add_ground(nogood.clone()));
        assert!(!store.add_ground(nogood));
        assert_eq!(store.ground().len(), 1);
    }

    #[test]
    fn store_forgets_under_budget() {
        let mut store = NogoodStore::new(4);
        for atom in 0..5 {
            store.add_ground(Nogood::new([Lit::positive(atom)]));
        }
        assert!(store.ground().len() <= 4);
    }

    #[test]
    fn grounder_instantiates_templates() {
        let mut registry = Registry::default();
        let p = registry.intern_constant("p");
        let e = registry.intern_constant("e");
        let a = registry.intern_constant("a");
        let x = registry.intern_variable("X");

        let pa = registry.intern_ground_atom(vec![p, a]);
        let ea = registry.intern_ground_atom(vec![e, a]);
        let p_x = registry.intern_nonground_atom(vec![p, x]);
        let e_x = registry.intern_nonground_atom(vec![e, x]);

        let mut store = NogoodStore::new(0);
        store.add_template(NogoodTemplate::new([
            Id::literal(p_x),
            Id::naf_literal(e_x),
        ]));

        let relevant: Interpretation = [pa.address, ea.address].into_iter().collect();
        let mut grounder = NogoodGrounder::new();
        let fresh = grounder.instantiate(&registry, &store, &relevant);

        assert_eq!(fresh.len(), 1);
        assert_eq!(
            fresh[0],
            Nogood::new([Lit::positive(pa.address), Lit::negative(ea.address)])
        );

        // Instances are produced once.
        assert!(grounder.instantiate(&registry, &store, &relevant).is_empty());
    }
}
