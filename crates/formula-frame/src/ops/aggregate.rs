use formula_vector::DataType::{Any as A, Date as D, Float as F, Integer as I, String as S};

use super::{signatures, OpSpec};

inventory::submit! {
    OpSpec {
        name: "sum",
        signatures: signatures![(I) -> I, (F) -> F],
        variadic: None,
        scalar: true,
    }
}

inventory::submit! {
    OpSpec {
        name: "mean",
        signatures: signatures![(I) -> F, (F) -> F],
        variadic: None,
        scalar: true,
    }
}

inventory::submit! {
    OpSpec {
        name: "count",
        signatures: signatures![(A) -> I],
        variadic: None,
        scalar: true,
    }
}

inventory::submit! {
    OpSpec {
        name: "min",
        signatures: signatures![(I) -> I, (F) -> F, (S) -> S, (D) -> D],
        variadic: None,
        scalar: true,
    }
}

inventory::submit! {
    OpSpec {
        name: "max",
        signatures: signatures![(I) -> I, (F) -> F, (S) -> S, (D) -> D],
        variadic: None,
        scalar: true,
    }
}

// The second operand is the quantile level and must be a constant in [0, 1].
inventory::submit! {
    OpSpec {
        name: "quantile",
        signatures: signatures![(F, F) -> F, (I, F) -> F],
        variadic: None,
        scalar: true,
    }
}

// Zero-based row index. Row-wise, but takes no operands.
inventory::submit! {
    OpSpec {
        name: "row_number",
        signatures: signatures![() -> I],
        variadic: None,
        scalar: false,
    }
}
