/*!
Nogood learning from oracle behaviour.

- *Input/output behaviour*: an answered query pins the input atoms at
  their current values and forces each interned replacement to the
  oracle's verdict on its output tuple.
- *Functionality*: for a source functional from output position `k`, two
  replacements agreeing on the inputs and the first `k` output positions
  but differing later can never both hold. These nogoods are static and
  laid down at initialisation.
- *Generalisation*: a ground behavioural nogood lifts to a nonground
  template when the oracle declares input predicate positions
  name-irrelevant --- the predicate constant is replaced by a variable
  throughout, and the template is instantiated against later assignments
  by the [NogoodGrounder](crate::nogoods::NogoodGrounder).

Linearity splitting happens earlier, on the query itself; see
[verify](crate::generator::verify).
*/

use crate::misc::log::targets;
use crate::structures::{ExternalAtom, Id, Interpretation, Lit, Nogood, NogoodTemplate};

use super::verify::EatomVerifier;

impl EatomVerifier {
    /// Derive behavioural nogoods for the external atom at `index` from
    /// an answered query: `projection` holds the input atoms currently
    /// true, `positive` the oracle's output tuples.
    pub(crate) fn learn_io_behaviour(
        &mut self,
        index: usize,
        external: &ExternalAtom,
        projection: &Interpretation,
        mask: &Interpretation,
        positive: &[Vec<Id>],
        out: &mut Vec<Nogood>,
    ) {
        let replacements = self.annotated.eatoms[index].positive_replacements.clone();

        for replacement in replacements {
            let (output, input_literals) = {
                let registry = self.registry.borrow();
                let tuple = &registry.ground_atom(replacement).tuple;
                let output = tuple[1 + external.inputs.len()..].to_vec();
                let input_literals: Vec<Lit> = mask
                    .iter_true()
                    .map(|atom| Lit::new(atom, projection.test(atom)))
                    .collect();
                (output, input_literals)
            };

            let actual = positive.contains(&output);
            let nogood = Nogood::new(
                input_literals
                    .iter()
                    .copied()
                    .chain([Lit::new(replacement, !actual)]),
            );

            log::trace!(
                target: targets::LEARNING,
                "Behavioural nogood for replacement {replacement}: forced {actual}"
            );

            if self.config.learning.generalise {
                self.generalise(index, external, &nogood);
            }
            out.push(nogood);
        }
    }

    /// Static functionality nogoods: no two distinct outputs of a
    /// functional source can hold together.
    pub(crate) fn functionality_nogoods(&self, index: usize) -> Vec<Nogood> {
        let properties = &self.properties[index];
        if !properties.functional {
            return Vec::new();
        }
        let start = properties.functional_start;

        let registry = self.registry.borrow();
        let replacements = &self.annotated.eatoms[index].positive_replacements;
        let prefix = {
            let annotation = &self.annotated.eatoms[index];
            let external = registry.external(annotation.eatom);
            1 + external.inputs.len()
        };

        let mut nogoods = Vec::new();
        for (position, first) in replacements.iter().enumerate() {
            for second in &replacements[position + 1..] {
                let first_output = &registry.ground_atom(*first).tuple[prefix..];
                let second_output = &registry.ground_atom(*second).tuple[prefix..];

                if first_output.len() != second_output.len() {
                    continue;
                }
                let agree_prefix = first_output[..start.min(first_output.len())]
                    == second_output[..start.min(second_output.len())];
                if agree_prefix && first_output != second_output {
                    nogoods.push(Nogood::new([
                        Lit::positive(*first),
                        Lit::positive(*second),
                    ]));
                }
            }
        }
        nogoods
    }

    /// Lift a ground behavioural nogood over the name-irrelevant input
    /// positions of its source into a template.
    fn generalise(&mut self, index: usize, external: &ExternalAtom, nogood: &Nogood) {
        let irrelevant = &self.properties[index].name_irrelevant;
        if irrelevant.is_empty() {
            return;
        }

        let mut registry = self.registry.borrow_mut();

        // One fresh variable per name-irrelevant input position.
        let mut replaced: std::collections::HashMap<Id, Id> =
            std::collections::HashMap::new();
        for position in irrelevant.iter() {
            let Some(input) = external.inputs.get(*position) else {
                continue;
            };
            let variable = registry.intern_variable(&format!("Vg{position}"));
            replaced.insert(*input, variable);
        }
        if replaced.is_empty() {
            return;
        }

        let mut literals = Vec::with_capacity(nogood.len());
        for literal in nogood.literals() {
            let tuple: Vec<Id> = registry
                .ground_atom(literal.address())
                .tuple
                .iter()
                .map(|term| replaced.get(term).copied().unwrap_or(*term))
                .collect();

            let atom = match registry.tuple_is_ground(&tuple) {
                true => registry.intern_ground_atom(tuple),
                false => registry.intern_nonground_atom(tuple),
            };
            literals.push(match literal.polarity() {
                true => Id::literal(atom),
                false => Id::naf_literal(atom),
            });
        }

        drop(registry);

        let template = NogoodTemplate::new(literals);
        if self.store.add_template(template) {
            log::debug!(target: targets::LEARNING, "Generalised a behavioural nogood");
        }
    }
}
