//! Per-iteration observation hook
//!
//! A sum type over the three observation modes: nothing, a text dump of pi
//! and P per iteration, or PNM images (one pi row per iteration plus one P
//! matrix frame per iteration). Observers only read solver state; I/O
//! failures are logged and never interrupt the solve.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use medius_core::ObserverKind;
use tracing::warn;

use crate::float::SolverFloat;
use crate::matrix::SparseMatrix;
use crate::pnm::{Colormap, PnmArray, PnmVector};

/// Observation hook invoked once per outer iteration.
pub enum Observer {
    /// No observation.
    None,
    /// Text dump of pi and P.
    File(FileObserver),
    /// PNM image dump of pi and P.
    Pnm(PnmObserver),
}

impl Observer {
    /// Build the observer selected by `kind`. `loops` sizes the pi image.
    pub fn new(kind: ObserverKind, basename: &str, m: usize, n: usize, loops: usize) -> Self {
        match kind {
            ObserverKind::None => Observer::None,
            ObserverKind::File => Observer::File(FileObserver {
                path: PathBuf::from(format!("{basename}.txt")),
                out: None,
                frame: 0,
            }),
            ObserverKind::Pnm => Observer::Pnm(PnmObserver {
                basename: basename.to_string(),
                pi_image: None,
                m,
                n,
                loops,
                frame: 0,
            }),
        }
    }

    /// Record one observation of the preference and dual state.
    pub fn make_observation<F: SolverFloat>(&mut self, ap: &SparseMatrix, p: &[F], pi: &[F]) {
        let outcome = match self {
            Observer::None => Ok(()),
            Observer::File(obs) => obs.observe(ap, p, pi),
            Observer::Pnm(obs) => obs.observe(ap, p, pi),
        };
        if let Err(error) = outcome {
            warn!(%error, "observation dropped");
        }
    }
}

/// Appends one text block per iteration to `<basename>.txt`.
pub struct FileObserver {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    frame: usize,
}

impl FileObserver {
    fn observe<F: SolverFloat>(
        &mut self,
        ap: &SparseMatrix,
        p: &[F],
        pi: &[F],
    ) -> io::Result<()> {
        if self.out.is_none() {
            self.out = Some(BufWriter::new(File::create(&self.path)?));
        }
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };

        writeln!(out, "frame {}", self.frame)?;
        self.frame += 1;

        write!(out, "pi:")?;
        for value in pi {
            write!(out, " {value}")?;
        }
        writeln!(out)?;

        for k in 0..ap.rows_len() {
            write!(out, "P {k}:")?;
            for elem in ap.row(k) {
                write!(out, " {}:{}", elem.column, p[elem.value as usize])?;
            }
            writeln!(out)?;
        }
        out.flush()
    }
}

/// Writes `<basename>-pi.pnm` (one row per iteration) and
/// `<basename>-P-<frame>.pnm` matrix frames.
pub struct PnmObserver {
    basename: String,
    pi_image: Option<PnmVector>,
    m: usize,
    n: usize,
    loops: usize,
    frame: usize,
}

impl PnmObserver {
    fn observe<F: SolverFloat>(
        &mut self,
        ap: &SparseMatrix,
        p: &[F],
        pi: &[F],
    ) -> io::Result<()> {
        let pi_map = Colormap::new(-5.0, 0.0, 5.0);
        let p_map = Colormap::new(-10.0, 0.0, 10.0);

        if self.pi_image.is_none() {
            let path = PathBuf::from(format!("{}-pi.pnm", self.basename));
            self.pi_image = Some(PnmVector::create(&path, self.m, self.loops)?);
        }
        self.pi_image
            .as_mut()
            .unwrap()
            .push_row(pi.iter().map(|v| pi_map.rgb(v.into_f64())))?;

        let mut image = PnmArray::new(self.m, self.n);
        for k in 0..ap.rows_len() {
            for elem in ap.row(k) {
                image
                    .pixel_mut(k, elem.column as usize)
                    .copy_from_slice(&p_map.rgb(p[elem.value as usize].into_f64()));
            }
        }
        let path = PathBuf::from(format!("{}-P-{}.pnm", self.basename, self.frame));
        self.frame += 1;
        image.write(&path)
    }
}
