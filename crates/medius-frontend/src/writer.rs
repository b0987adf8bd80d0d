//! LP and solution writers
//!
//! [`write_problem`] re-serializes a raw problem so that parsing the output
//! yields the same problem up to constraint ordering and label defaults.
//! [`write_solution`] emits the solution file: a comment header carrying
//! the problem-type tag and status, one `name=0|1` line per variable, and
//! the final objective value.

use std::fmt::Write as _;
use std::io::{self, Write};

use medius_core::{
    Constraint, ObjectiveSense, RawProblem, SolverResult, VariableType,
};

/// Serialize a raw problem in LP format.
pub fn write_problem(pb: &RawProblem) -> String {
    let mut out = String::new();

    match pb.sense {
        ObjectiveSense::Minimize => out.push_str("minimize\n"),
        ObjectiveSense::Maximize => out.push_str("maximize\n"),
    }

    out.push_str("obj:");
    for elem in &pb.objective.elements {
        let name = &pb.vars.names[elem.variable as usize];
        if elem.factor < 0.0 {
            let _ = write!(out, " - {} {}", -elem.factor, name);
        } else {
            let _ = write!(out, " + {} {}", elem.factor, name);
        }
    }
    if pb.objective.constant != 0.0 {
        if pb.objective.constant < 0.0 {
            let _ = write!(out, " - {}", -pb.objective.constant);
        } else {
            let _ = write!(out, " + {}", pb.objective.constant);
        }
    }
    out.push('\n');

    out.push_str("subject to\n");
    for (list, op) in [
        (&pb.equal_constraints, "="),
        (&pb.greater_constraints, ">="),
        (&pb.less_constraints, "<="),
    ] {
        for cst in list.iter() {
            write_constraint(&mut out, pb, cst, op);
        }
    }

    let binaries: Vec<&str> = pb
        .vars
        .names
        .iter()
        .zip(&pb.vars.values)
        .filter(|(_, v)| v.kind == VariableType::Binary)
        .map(|(n, _)| n.as_str())
        .collect();
    if !binaries.is_empty() {
        out.push_str("binary\n");
        for name in binaries {
            out.push_str(name);
            out.push('\n');
        }
    }

    let generals: Vec<&str> = pb
        .vars
        .names
        .iter()
        .zip(&pb.vars.values)
        .filter(|(_, v)| v.kind == VariableType::General)
        .map(|(n, _)| n.as_str())
        .collect();
    if !generals.is_empty() {
        out.push_str("general\n");
        for name in generals {
            out.push_str(name);
            out.push('\n');
        }
    }

    out.push_str("end\n");
    out
}

fn write_constraint(out: &mut String, pb: &RawProblem, cst: &Constraint, op: &str) {
    let _ = write!(out, "{}:", cst.label);
    for elem in &cst.elements {
        let name = &pb.vars.names[elem.variable as usize];
        if elem.factor < 0 {
            let _ = write!(out, " - {} {}", -elem.factor, name);
        } else {
            let _ = write!(out, " + {} {}", elem.factor, name);
        }
    }
    let _ = writeln!(out, " {} {}", op, cst.value);
}

/// Write the solution file for a finished solve.
///
/// # Errors
///
/// Propagates I/O failures of the underlying writer.
pub fn write_solution<W: Write>(mut w: W, result: &SolverResult) -> io::Result<()> {
    if let Some(problem_type) = result.problem_type {
        writeln!(w, "\\ problem type: {}", problem_type.tag())?;
    }
    writeln!(w, "\\ status: {}", result.status.tag())?;
    writeln!(
        w,
        "\\ variables: {} constraints: {}",
        result.variables, result.constraints
    )?;

    if result.is_success() {
        for (name, value) in result.full_assignment() {
            writeln!(w, "{}={}", name, u8::from(value))?;
        }
        if let Some(best) = result.best() {
            writeln!(w, "\\ objective: {}", best.value)?;
        }
    } else {
        writeln!(
            w,
            "\\ no feasible solution, {} constraints remain violated",
            result.remaining_constraints
        )?;
    }

    Ok(())
}
