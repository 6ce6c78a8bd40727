//! Basic usage example transforming one synthetic source image into every
//! supported output format.
//!
//! This demonstrates the engine lifecycle: configure, transform, inspect
//! the encoded artifacts, drop.

#![allow(missing_docs, reason = "No need for API documentation in example code")]

use new_zealand::nz;
use pixelpipe::{
    Engine, EngineOptions, OutputFormat, ResizeFit, SourceImage, TransformRequest,
};

fn main() {
    println!("pixelpipe Basic Usage Example");
    println!("=============================");
    println!();

    let engine = Engine::new(EngineOptions {
        worker_threads: nz!(4),
        concurrency_limit: nz!(4),
        cache: true,
    });

    let source = SourceImage::synthetic(1024, 768).expect("synthetic source generation failed");

    println!(
        "Source: {} bytes of encoded JPEG ({}x{})",
        source.bytes().len(),
        1024,
        768
    );
    println!();

    for format in OutputFormat::ALL {
        let artifact = engine
            .transform(&TransformRequest {
                source: source.clone(),
                target_width: 320,
                target_height: 240,
                fit: ResizeFit::Cover,
                options: format.sweep_options(),
                max_pixels: 10_000_000,
            })
            .expect("transform failed");

        println!("{format:<6}: {} bytes", artifact.len());
    }

    println!();
    println!("Basic usage example completed successfully!");
}
