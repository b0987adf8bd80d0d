//! End-to-end scenarios through the public API: LP text in, solutions out.

use medius::{
    compute_solution, is_valid_solution, parse_problem, solve, PreprocessorKind,
    SolverParameters, Status,
};

fn params(seed: u64) -> SolverParameters {
    SolverParameters {
        seed: Some(seed),
        limit: 1000,
        ..Default::default()
    }
}

#[test]
fn covering_pair_costs_one() {
    let raw = parse_problem(
        "minimize\nobj: x1 + x2\nsubject to\nc1: x1 + x2 >= 1\nbinary\nx1\nx2\nend\n",
    )
    .unwrap();

    let result = solve(&params(1), &raw).unwrap();
    assert_eq!(result.status, Status::Success);
    assert!(is_valid_solution(&raw, &result));

    let best = result.best().unwrap();
    assert_eq!(best.value, 1.0);
    assert_eq!(best.variables.iter().filter(|&&b| b).count(), 1);
}

#[test]
fn packing_reaches_the_optimum() {
    let raw = parse_problem(
        "maximize\nobj: 3 x1 + 2 x2 + 4 x3\nsubject to\nc1: x1 + x2 + x3 <= 2\nbinary\nx1\nx2\nx3\nend\n",
    )
    .unwrap();

    let result = solve(&params(1), &raw).unwrap();
    assert_eq!(result.status, Status::Success);
    assert!(is_valid_solution(&raw, &result));

    let best = result.best().unwrap();
    assert_eq!(best.value, 7.0);
    assert_eq!(compute_solution(&raw, &result), Some(7.0));
}

#[test]
fn chained_covers_share_the_middle_variable() {
    let raw = parse_problem(
        "minimize\nobj: x1 + x2 + x3\nsubject to\nc1: x1 + x2 >= 1\nc2: x2 + x3 >= 1\nbinary\nx1\nx2\nx3\nend\n",
    )
    .unwrap();

    let result = solve(&params(1), &raw).unwrap();
    assert_eq!(result.status, Status::Success);
    assert!(is_valid_solution(&raw, &result));

    let best = result.best().unwrap();
    assert_eq!(best.value, 1.0);
    // Only the shared variable carries the optimum.
    let names: Vec<&str> = result
        .variable_names
        .iter()
        .zip(&best.variables)
        .filter(|(_, &set)| set)
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["x2"]);
}

#[test]
fn negated_equality_lands_on_its_bound() {
    let raw = parse_problem(
        "minimize\nobj: x1 + x2 + x3 + x4 + x5\nsubject to\nc1: - x1 - x2 + x3 + x4 + x5 = 2\nbinary\nx1\nx2\nx3\nx4\nx5\nend\n",
    )
    .unwrap();

    let result = solve(&params(1), &raw).unwrap();
    assert_eq!(result.status, Status::Success);
    assert!(is_valid_solution(&raw, &result));
    // Two of the positive variables, none of the negated ones.
    assert_eq!(compute_solution(&raw, &result), Some(2.0));
}

#[test]
fn time_limit_zero_means_unlimited() {
    let raw = parse_problem(
        "minimize\nobj: x1 + x2\nsubject to\nc1: x1 + x2 >= 1\nbinary\nx1\nx2\nend\n",
    )
    .unwrap();

    let mut p = params(1);
    p.time_limit = 0.0;
    let result = solve(&p, &raw).unwrap();
    assert_eq!(result.status, Status::Success);
}

#[test]
fn preprocessor_carries_affected_variables_back() {
    // x1 is pinned by its own constraint; x1 + x2 = 2 then forces x2.
    let raw = parse_problem(
        "minimize\nobj: x1 + x2 + x3\nsubject to\nc1: x1 = 1\nc2: x1 + x2 = 2\nc3: x2 + x3 <= 1\nbinary\nx1\nx2\nx3\nend\n",
    )
    .unwrap();

    let result = solve(&params(1), &raw).unwrap();
    assert_eq!(result.status, Status::Success);

    let assignment: std::collections::HashMap<&str, bool> =
        result.full_assignment().into_iter().collect();
    assert_eq!(assignment["x1"], true);
    assert_eq!(assignment["x2"], true);
    assert_eq!(assignment["x3"], false);
    assert!(is_valid_solution(&raw, &result));
}

#[test]
fn preprocessor_none_still_solves() {
    let raw = parse_problem(
        "minimize\nobj: x1 + x2\nsubject to\nc1: x1 = 1\nc2: x1 + x2 >= 1\nbinary\nx1\nx2\nend\n",
    )
    .unwrap();

    let mut p = params(1);
    p.preprocessor = PreprocessorKind::None;
    let result = solve(&p, &raw).unwrap();
    assert_eq!(result.status, Status::Success);
    assert!(result.affected.is_empty());
    assert!(is_valid_solution(&raw, &result));
}

#[test]
fn conflicting_duplicate_constraints_fail() {
    let raw = parse_problem(
        "minimize\nobj: x1 + x2\nsubject to\nc1: x1 + x2 = 1\nc2: x1 + x2 = 2\nbinary\nx1\nx2\nend\n",
    )
    .unwrap();

    assert!(solve(&params(1), &raw).is_err());
}

/// Eight queens as pseudo-Boolean rows: row and column equalities plus
/// diagonal packing rows. The solver reaches feasibility within a few
/// seeded restarts.
#[test]
fn eight_queens_is_feasible() {
    let raw = parse_problem(&n_queens_lp(8)).unwrap();

    let mut p = SolverParameters {
        limit: 5000,
        time_limit: 10.0,
        theta: 0.5,
        delta: 1.0,
        kappa_min: 0.30,
        kappa_step: 1e-2,
        kappa_max: 100.0,
        alpha: 1.0,
        w: 60,
        order: medius::ConstraintOrder::RandomSorting,
        ..Default::default()
    };

    let solved = (1..=10).any(|seed| {
        p.seed = Some(seed);
        let result = solve(&p, &raw).unwrap();
        if result.status == Status::Success {
            assert_eq!(result.remaining_constraints, 0);
            assert!(is_valid_solution(&raw, &result));
            assert_eq!(compute_solution(&raw, &result), Some(8.0));
            true
        } else {
            false
        }
    });
    assert!(solved, "no seed reached feasibility");
}

fn n_queens_lp(n: usize) -> String {
    use std::fmt::Write as _;

    let mut out = String::from("minimize\nobj:");
    for r in 0..n {
        for c in 0..n {
            let _ = write!(out, " + x{r}_{c}");
        }
    }
    out.push_str("\nsubject to\n");

    for r in 0..n {
        let _ = write!(out, "row{r}:");
        for c in 0..n {
            let _ = write!(out, " + x{r}_{c}");
        }
        out.push_str(" = 1\n");
    }
    for c in 0..n {
        let _ = write!(out, "col{c}:");
        for r in 0..n {
            let _ = write!(out, " + x{r}_{c}");
        }
        out.push_str(" = 1\n");
    }

    let mut diag = 0;
    for d in -(n as i64 - 2)..=(n as i64 - 2) {
        let cells: Vec<(usize, usize)> = (0..n)
            .filter_map(|r| {
                let c = r as i64 - d;
                (0..n as i64).contains(&c).then_some((r, c as usize))
            })
            .collect();
        if cells.len() < 2 {
            continue;
        }
        let _ = write!(out, "dm{diag}:");
        diag += 1;
        for (r, c) in cells {
            let _ = write!(out, " + x{r}_{c}");
        }
        out.push_str(" <= 1\n");
    }
    for d in 1..=(2 * n as i64 - 3) {
        let cells: Vec<(usize, usize)> = (0..n)
            .filter_map(|r| {
                let c = d - r as i64;
                (0..n as i64).contains(&c).then_some((r, c as usize))
            })
            .collect();
        if cells.len() < 2 {
            continue;
        }
        let _ = write!(out, "dp{diag}:");
        diag += 1;
        for (r, c) in cells {
            let _ = write!(out, " + x{r}_{c}");
        }
        out.push_str(" <= 1\n");
    }

    out.push_str("binary\n");
    for r in 0..n {
        for c in 0..n {
            let _ = writeln!(out, "x{r}_{c}");
        }
    }
    out.push_str("end\n");
    out
}
