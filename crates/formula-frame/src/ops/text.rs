use formula_vector::DataType::{Any as A, Categorical as C, Date as D, Integer as I, String as S};

use super::{signatures, OpSpec};

// The output type comes from the constant target name, e.g. `cast(x, 'float')`.
inventory::submit! {
    OpSpec {
        name: "cast",
        signatures: signatures![(A, S) -> A],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "concat",
        signatures: signatures![(S, S) -> S],
        variadic: Some(S),
        scalar: false,
    }
}

// `cat(x)` or `cat(x, fuzz)`.
inventory::submit! {
    OpSpec {
        name: "cat",
        signatures: signatures![(S) -> C, (I) -> C, (D) -> C],
        variadic: Some(I),
        scalar: false,
    }
}

// `applyCat(raw, categorical, default)`
inventory::submit! {
    OpSpec {
        name: "applyCat",
        signatures: signatures![(S, C, S) -> C, (I, C, I) -> C, (D, C, D) -> C],
        variadic: None,
        scalar: false,
    }
}
