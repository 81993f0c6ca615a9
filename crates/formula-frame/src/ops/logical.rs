use formula_vector::DataType::{Date as D, Float as F, Integer as I, String as S};

use super::{signatures, OpSpec};

macro_rules! comparison {
    ($name:literal) => {
        inventory::submit! {
            OpSpec {
                name: $name,
                signatures: signatures![
                    (I, I) -> I,
                    (F, F) -> I,
                    (I, F) -> I,
                    (F, I) -> I,
                    (S, S) -> I,
                    (D, D) -> I,
                ],
                variadic: None,
                scalar: false,
            }
        }
    };
}

comparison!("eq");
comparison!("ne");
comparison!("ge");
comparison!("gt");
comparison!("le");
comparison!("lt");

inventory::submit! {
    OpSpec {
        name: "and",
        signatures: signatures![(I, I) -> I],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "or",
        signatures: signatures![(I, I) -> I],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "not",
        signatures: signatures![(I) -> I],
        variadic: None,
        scalar: false,
    }
}

// Mixed integer/float branches widen to float.
inventory::submit! {
    OpSpec {
        name: "if",
        signatures: signatures![
            (I, I, I) -> I,
            (I, F, F) -> F,
            (I, I, F) -> F,
            (I, F, I) -> F,
            (I, S, S) -> S,
            (I, D, D) -> D,
        ],
        variadic: None,
        scalar: false,
    }
}
