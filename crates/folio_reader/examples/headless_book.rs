//! Headless Book Demo
//!
//! Drives a book without a renderer on the virtual clock:
//! - A drag that turns the first page
//! - A drag that falls short and springs back
//! - A cascade to the last page, then back to the first
//!
//! Pass a TOML config path as the first argument to override the defaults.
//!
//! Run with: cargo run -p folio_reader --example headless_book [folio.toml]

use anyhow::Context;
use folio_animation::FrameScheduler;
use folio_reader::prelude::*;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

const PAGES: u64 = 12;
const FRAME: Duration = Duration::from_millis(16);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ReaderConfig::load(Path::new(&path))
            .with_context(|| format!("loading config from {path}"))?,
        None => ReaderConfig::default(),
    };
    let forward = config.gesture.reading_direction.forward_offset(1.0);

    let scheduler = FrameScheduler::with_virtual_clock();
    let logs: Vec<_> = (0..PAGES).map(|i| HeadlessSurface::new(MeshHandle(i))).collect();
    let surfaces: Vec<Box<dyn PageSurface>> = logs
        .iter()
        .map(|surface| Box::new(surface.clone()) as Box<dyn PageSurface>)
        .collect();
    let book = Book::new(scheduler.handle(), config, surfaces)?;

    let turns = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&turns);
    book.on_page_turn(move |turn| sink.borrow_mut().push(turn));

    // A long drag in the reading direction commits
    book.pointer_down(600.0);
    for step in 1..=10 {
        book.pointer_move(600.0 + forward * 40.0 * step as f64);
    }
    if let Some(handle) = book.pointer_up(600.0 + forward * 400.0) {
        let frames = run_until(&scheduler, handle);
        tracing::info!(frames, current_index = book.current_index(), "long drag settled");
    }

    // A short one reverts
    book.pointer_down(600.0);
    book.pointer_move(600.0 + forward * 80.0);
    if let Some(handle) = book.pointer_up(600.0 + forward * 80.0) {
        let frames = run_until(&scheduler, handle);
        tracing::info!(frames, current_index = book.current_index(), "short drag settled");
    }

    let to_end = book.to_end().context("a cascade is already running")?;
    let frames = run_until(&scheduler, to_end);
    tracing::info!(frames, current_index = book.current_index(), "cascade to end settled");

    let to_start = book.to_start().context("a cascade is already running")?;
    let frames = run_until(&scheduler, to_start);
    tracing::info!(frames, current_index = book.current_index(), "cascade to start settled");

    let applies: usize = logs.iter().map(|surface| surface.log().borrow().applies).sum();
    println!("page turns: {:?}", turns.borrow());
    println!("surface updates: {applies}");
    println!("virtual time: {:?}", scheduler.now());
    Ok(())
}

/// Tick the scheduler until `future` resolves, returning the frame count
fn run_until<F: std::future::Future + Unpin>(scheduler: &FrameScheduler, mut future: F) -> u64 {
    let start = scheduler.frame();
    while scheduler.has_active() {
        scheduler.advance(FRAME);
    }
    let _ = pollster::block_on(&mut future);
    scheduler.frame() - start
}
