/**
Rectangular linear assignment. Given an `m x n` cost matrix, find the set of `min(m, n)` pairs
`(row, column)`, using every row and every column at most once, whose total cost is minimal.

The solver is the shortest augmenting path variant of the Hungarian method: rows are inserted one
at a time and a Dijkstra-like search over the reduced costs (maintained through row and column
potentials) finds the cheapest augmenting path. It runs in `O(m^2 n)` when `m <= n`; taller
matrices are solved on their transpose.

Columns are scanned from the last to the first, and among columns reached at the same path cost
an unassigned one is preferred. Equal-cost alternatives are therefore resolved the way scipy's
`linear_sum_assignment` resolves them.
*/
use ndarray::ArrayView2;
use std::{
    error::Error,
    fmt::{self, Display},
};

#[derive(Debug, Clone, Copy, PartialEq)]
/// Errors raised by the assignment solver.
pub enum AssignmentError {
    /// The cost at (`row`, `column`) is `NaN` or infinite.
    NonFiniteCost { row: usize, column: usize, value: f64 },
}

impl Display for AssignmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteCost { row, column, value } => write!(
                f,
                "The cost matrix contains a non finite value ({}) at row {}, column {}",
                value, row, column
            ),
        }
    }
}
impl Error for AssignmentError {}

/// Solves the minimum cost assignment problem. The returned pairs are sorted by row.
pub fn linear_sum_assignment(
    cost: ArrayView2<f64>,
) -> Result<Vec<(usize, usize)>, AssignmentError> {
    if let Some(((row, column), value)) = cost.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(AssignmentError::NonFiniteCost {
            row,
            column,
            value: *value,
        });
    }
    let (rows, columns) = cost.dim();
    if rows == 0 || columns == 0 {
        return Ok(Vec::new());
    }
    if rows <= columns {
        Ok(solve_wide(cost))
    } else {
        let mut pairs: Vec<_> = solve_wide(cost.t())
            .into_iter()
            .map(|(column, row)| (row, column))
            .collect();
        pairs.sort_unstable();
        Ok(pairs)
    }
}

/// Solves the assignment problem maximizing the total score instead of minimizing a cost.
pub fn maximum_score_assignment(
    scores: ArrayView2<f64>,
) -> Result<Vec<(usize, usize)>, AssignmentError> {
    linear_sum_assignment(scores.mapv(|s| -s).view())
}

/// Requires `rows <= columns` and finite costs.
fn solve_wide(cost: ArrayView2<f64>) -> Vec<(usize, usize)> {
    let (rows, columns) = cost.dim();
    let mut row_potential = vec![0.0; rows];
    let mut column_potential = vec![0.0; columns];
    let mut path_costs = vec![f64::INFINITY; columns];
    let mut path = vec![0usize; columns];
    let mut column_of_row: Vec<Option<usize>> = vec![None; rows];
    let mut row_of_column: Vec<Option<usize>> = vec![None; columns];
    let mut visited_rows = vec![false; rows];
    let mut visited_columns = vec![false; columns];
    let mut remaining = Vec::with_capacity(columns);
    for current_row in 0..rows {
        // Dijkstra-like search for the cheapest path from `current_row` to a free column.
        path_costs.fill(f64::INFINITY);
        visited_rows.fill(false);
        visited_columns.fill(false);
        remaining.clear();
        remaining.extend((0..columns).rev());
        let mut min_value = 0.0;
        let mut row = current_row;
        let sink = loop {
            visited_rows[row] = true;
            let mut lowest = f64::INFINITY;
            let mut best = 0;
            for (position, &column) in remaining.iter().enumerate() {
                let reduced =
                    min_value + cost[[row, column]] - row_potential[row] - column_potential[column];
                if reduced < path_costs[column] {
                    path[column] = row;
                    path_costs[column] = reduced;
                }
                if path_costs[column] < lowest
                    || (path_costs[column] == lowest && row_of_column[column].is_none())
                {
                    lowest = path_costs[column];
                    best = position;
                }
            }
            min_value = lowest;
            let column = remaining.swap_remove(best);
            visited_columns[column] = true;
            match row_of_column[column] {
                Some(next_row) => row = next_row,
                None => break column,
            }
        };

        row_potential[current_row] += min_value;
        for visited in (0..rows).filter(|&r| visited_rows[r] && r != current_row) {
            if let Some(column) = column_of_row[visited] {
                row_potential[visited] += min_value - path_costs[column];
            }
        }
        for column in (0..columns).filter(|&c| visited_columns[c]) {
            column_potential[column] -= min_value - path_costs[column];
        }

        // Flip the assignments along the augmenting path.
        let mut column = sink;
        loop {
            let row = path[column];
            row_of_column[column] = Some(row);
            let previous = column_of_row[row].replace(column);
            if row == current_row {
                break;
            }
            match previous {
                Some(previous) => column = previous,
                None => break,
            }
        }
    }
    column_of_row
        .iter()
        .enumerate()
        .filter_map(|(row, column)| column.map(|column| (row, column)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use ndarray::{array, Array2};
    use quickcheck::{QuickCheck, TestResult};
    use rstest::rstest;

    fn total(cost: &Array2<f64>, pairs: &[(usize, usize)]) -> f64 {
        pairs.iter().map(|(r, c)| cost[[*r, *c]]).sum()
    }

    fn brute_force_minimum(cost: &Array2<f64>) -> f64 {
        let (rows, columns) = cost.dim();
        if rows <= columns {
            (0..columns)
                .permutations(rows)
                .map(|cols| cols.iter().enumerate().map(|(r, c)| cost[[r, *c]]).sum::<f64>())
                .fold(f64::INFINITY, f64::min)
        } else {
            brute_force_minimum(&cost.t().to_owned())
        }
    }

    #[test]
    fn test_anti_diagonal_is_selected() {
        let scores = array![[0.5, 1.0], [1.0, 0.5]];
        let pairs = maximum_score_assignment(scores.view()).unwrap();
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_beats_greedy_matching() {
        // Greedily taking the best cell (0.9) leaves 0.0 for the second row.
        let scores = array![[0.9, 0.8], [0.7, 0.0]];
        let pairs = maximum_score_assignment(scores.view()).unwrap();
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
        assert!((total(&scores, &pairs) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_minimum_cost() {
        let cost = array![[4.0, 1.0, 3.0], [2.0, 0.0, 5.0], [3.0, 2.0, 2.0]];
        let pairs = linear_sum_assignment(cost.view()).unwrap();
        assert_eq!(pairs, vec![(0, 1), (1, 0), (2, 2)]);
        assert_eq!(total(&cost, &pairs), 5.0);
    }

    #[rstest]
    #[case(2, 5)]
    #[case(5, 2)]
    #[case(1, 1)]
    #[case(3, 3)]
    fn test_rectangular_pairs_count(#[case] rows: usize, #[case] columns: usize) {
        let cost = Array2::from_shape_fn((rows, columns), |(r, c)| ((r * 7 + c * 3) % 5) as f64);
        let pairs = linear_sum_assignment(cost.view()).unwrap();
        assert_eq!(pairs.len(), rows.min(columns));
        assert!(pairs.iter().map(|p| p.0).all_unique());
        assert!(pairs.iter().map(|p| p.1).all_unique());
        assert!((total(&cost, &pairs) - brute_force_minimum(&cost)).abs() < 1e-9);
    }

    #[rstest]
    #[case(0, 3)]
    #[case(3, 0)]
    #[case(0, 0)]
    fn test_empty_dimension(#[case] rows: usize, #[case] columns: usize) {
        let cost = Array2::<f64>::zeros((rows, columns));
        assert_eq!(linear_sum_assignment(cost.view()), Ok(vec![]));
    }

    #[rstest]
    #[case((2, 2), vec![(0, 0), (1, 1)])]
    #[case((3, 2), vec![(0, 0), (1, 1)])]
    #[case((2, 3), vec![(0, 0), (1, 1)])]
    #[case((1, 3), vec![(0, 0)])]
    #[case((3, 1), vec![(0, 0)])]
    fn test_ties_prefer_free_columns(
        #[case] shape: (usize, usize),
        #[case] expected: Vec<(usize, usize)>,
    ) {
        let cost = Array2::<f64>::zeros(shape);
        assert_eq!(linear_sum_assignment(cost.view()), Ok(expected));
    }

    #[test]
    fn test_tie_with_shared_best_column() {
        // Both rows prefer column 0 equally; the second row settles for the free column.
        let scores = array![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let pairs = maximum_score_assignment(scores.view()).unwrap();
        assert_eq!(pairs, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_non_finite_cost() {
        let cost = array![[0.0, 1.0], [f64::INFINITY, 0.0]];
        let actual = linear_sum_assignment(cost.view());
        assert_eq!(
            actual,
            Err(AssignmentError::NonFiniteCost {
                row: 1,
                column: 0,
                value: f64::INFINITY
            })
        );
    }

    #[test]
    fn test_optimal_against_brute_force() {
        fn prop(values: Vec<u8>, rows: u8, columns: u8) -> TestResult {
            let rows = 1 + (rows % 4) as usize;
            let columns = 1 + (columns % 4) as usize;
            if values.len() < rows * columns {
                return TestResult::discard();
            }
            let cost = Array2::from_shape_fn((rows, columns), |(r, c)| {
                values[r * columns + c] as f64 / 17.0
            });
            let pairs = linear_sum_assignment(cost.view()).unwrap();
            let is_injective = pairs.iter().map(|p| p.0).all_unique()
                && pairs.iter().map(|p| p.1).all_unique();
            TestResult::from_bool(
                is_injective
                    && pairs.len() == rows.min(columns)
                    && (total(&cost, &pairs) - brute_force_minimum(&cost)).abs() < 1e-9,
            )
        }
        QuickCheck::new()
            .tests(500)
            .quickcheck(prop as fn(Vec<u8>, u8, u8) -> TestResult);
    }
}
