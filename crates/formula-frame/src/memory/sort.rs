use std::cmp::Ordering;

use formula_vector::Vector;
use ordered_float::OrderedFloat;

use super::MemFrame;
use crate::FrameResult;

impl MemFrame {
    /// Stable multi-key sort. Every column is permuted in lockstep, so rows stay aligned.
    pub fn sort_in_place(&mut self, ascending: bool, keys: &[&str]) -> FrameResult<()> {
        let key_data = keys
            .iter()
            .map(|key| self.column_values(key))
            .collect::<FrameResult<Vec<_>>>()?;

        let mut order: Vec<usize> = (0..self.rows()).collect();
        order.sort_by(|&a, &b| {
            for data in &key_data {
                let ord = compare_rows(data, a, b);
                let ord = if ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        self.permute(&order);
        Ok(())
    }

    /// Move row `order[i]` to position `i` by following each permutation cycle once.
    fn permute(&mut self, order: &[usize]) {
        let mut placed = vec![false; order.len()];
        for start in 0..order.len() {
            if placed[start] {
                continue;
            }
            let mut pos = start;
            loop {
                placed[pos] = true;
                let next = order[pos];
                if next == start {
                    break;
                }
                for column in &mut self.columns {
                    column.data.swap(pos, next);
                }
                pos = next;
            }
        }
    }
}

fn compare_rows(data: &Vector, a: usize, b: usize) -> Ordering {
    match data {
        Vector::Integer(v) => v[a].cmp(&v[b]),
        Vector::Float(v) => OrderedFloat(v[a]).cmp(&OrderedFloat(v[b])),
        Vector::String(v) => v[a].cmp(&v[b]),
        Vector::Date(v) => v[a].cmp(&v[b]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permute_applies_a_gather_order() {
        let mut frame = MemFrame::new();
        frame.add_column("x", vec!["a", "b", "c", "d"]).unwrap();
        frame.add_column("y", vec![0_i64, 1, 2, 3]).unwrap();
        frame.permute(&[2, 0, 3, 1]);
        assert_eq!(
            frame.column_values("x").unwrap(),
            &Vector::from(vec!["c", "a", "d", "b"])
        );
        assert_eq!(
            frame.column_values("y").unwrap(),
            &Vector::from(vec![2_i64, 0, 3, 1])
        );
    }
}
