use formula_vector::DataType::{Float as F, Integer as I, String as S};

use super::{signatures, OpSpec};

inventory::submit! {
    OpSpec {
        name: "add",
        signatures: signatures![(I, I) -> I, (F, F) -> F, (I, F) -> F, (F, I) -> F, (S, S) -> S],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "subtract",
        signatures: signatures![(I, I) -> I, (F, F) -> F, (I, F) -> F, (F, I) -> F],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "multiply",
        signatures: signatures![(I, I) -> I, (F, F) -> F, (I, F) -> F, (F, I) -> F],
        variadic: None,
        scalar: false,
    }
}

// Integer division still produces a float.
inventory::submit! {
    OpSpec {
        name: "divide",
        signatures: signatures![(F, F) -> F, (I, I) -> F, (I, F) -> F, (F, I) -> F],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "pow",
        signatures: signatures![(F, F) -> F, (I, I) -> F, (I, F) -> F, (F, I) -> F],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "negate",
        signatures: signatures![(I) -> I, (F) -> F],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "abs",
        signatures: signatures![(I) -> I, (F) -> F],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "exp",
        signatures: signatures![(F) -> F, (I) -> F],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "log",
        signatures: signatures![(F) -> F, (I) -> F],
        variadic: None,
        scalar: false,
    }
}

inventory::submit! {
    OpSpec {
        name: "sqrt",
        signatures: signatures![(F) -> F, (I) -> F],
        variadic: None,
        scalar: false,
    }
}
