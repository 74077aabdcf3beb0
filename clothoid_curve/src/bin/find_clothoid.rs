//! find_clothoid x0 y0 theta0 x1 y1 theta1
//! find_clothoid x0 y0 theta0 kappa0 x1 y1 theta1 kappa1
//!
//! Prints the G1 clothoid between two poses, or the three arcs of the G2 fit
//! when both end curvatures are given. RUST_LOG=debug shows solver progress.

use clothoid_curve::fit::{build_g1_with_iterations, DEFAULT_TOLERANCE};
use clothoid_curve::{solve_g2, G2Params};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()?;

    match args[..] {
        [x0, y0, theta0, x1, y1, theta1] => {
            let (clothoid, iterations) =
                build_g1_with_iterations(x0, y0, theta0, x1, y1, theta1, DEFAULT_TOLERANCE)?;
            println!("{clothoid}");
            println!("{iterations} iterations");
        }
        [x0, y0, theta0, kappa0, x1, y1, theta1, kappa1] => {
            let chain = solve_g2(
                x0,
                y0,
                theta0,
                kappa0,
                x1,
                y1,
                theta1,
                kappa1,
                G2Params::default(),
            )?;
            for clothoid in chain.segments() {
                println!("{clothoid}");
            }
            println!(
                "total length {:.6}, {} iterations",
                chain.total_length(),
                chain.iterations()
            );
        }
        _ => {
            eprintln!("usage: find_clothoid x0 y0 theta0 [kappa0] x1 y1 theta1 [kappa1]");
            std::process::exit(2);
        }
    }
    Ok(())
}
