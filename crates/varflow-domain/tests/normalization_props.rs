use proptest::prelude::*;
use varflow_domain::{normalize_protein, VariantDescriptor};

/// Fragmentos que combinan códigos de tres letras, sufijos y ruido.
fn fragment() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["p.", "Leu", "Phe", "Ter", "Stop", "Ser", "Gly", "Xaa", "fs", "ext", "del", "ins", "dup",
                              "frameshift", "Frame", "shift", "*", "?", "-", "_", "1", "23", "507", "(", ")", " ", "a",
                              "e", "X", "L", "um", "t"])
}

fn protein_like() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment(), 0..12).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn normalization_is_idempotent(input in protein_like()) {
        let once = normalize_protein(&input);
        prop_assert_eq!(normalize_protein(&once), once);
    }

    #[test]
    fn normalization_is_idempotent_on_arbitrary_text(input in "\\PC{0,40}") {
        let once = normalize_protein(&input);
        prop_assert_eq!(normalize_protein(&once), once);
    }

    #[test]
    fn invocation_input_is_stable(change in protein_like()) {
        let d = VariantDescriptor::new(format!("ATM:p.{change}"));
        prop_assert_eq!(d.invocation_input(None), d.invocation_input(None));
        prop_assert!(!d.invocation_input(None).contains('\n'));
    }
}
