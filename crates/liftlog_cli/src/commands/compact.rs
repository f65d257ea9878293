//! Compact command implementation.

use super::CmdResult;
use liftlog_core::Database;

/// Rewrites the operation log as one snapshot frame.
pub fn run(db: &Database) -> CmdResult {
    let frames = db.store().log_frames();
    let before = db.store().log_size()?;

    db.compact()?;

    let after = db.store().log_size()?;
    println!("✓ Compaction complete");
    println!("  Frames:      {frames} -> {}", db.store().log_frames());
    println!("  Size before: {before} bytes");
    println!("  Size after:  {after} bytes");
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        before.saturating_sub(after),
        if before > 0 {
            (before.saturating_sub(after) as f64 / before as f64) * 100.0
        } else {
            0.0
        }
    );
    Ok(())
}
