use std::path::Path;
use tibia_core::{FileLoader, NodeId};

const PREVIEW_BYTES: usize = 16;

fn dump(loader: &mut FileLoader, node: NodeId, depth: usize, totals: &mut (usize, usize)) {
    let node_type = loader.node_type(node).unwrap_or(0);
    let line = match loader.get_props(node) {
        Ok(props) => {
            totals.1 += props.len();
            let preview: Vec<String> = props
                .iter()
                .take(PREVIEW_BYTES)
                .map(|byte| format!("{:02x}", byte))
                .collect();
            let more = if props.len() > PREVIEW_BYTES { " .." } else { "" };
            format!("type={} props={} [{}{}]", node_type, props.len(), preview.join(" "), more)
        }
        Err(err) => format!("type={} props unreadable: {}", node_type, err),
    };
    totals.0 += 1;
    println!("{}{}", "  ".repeat(depth), line);

    let children: Vec<NodeId> = loader.children(node).collect();
    for child in children {
        dump(loader, child, depth + 1, totals);
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: node_dump <node-file> [--no-cache]");
        std::process::exit(1);
    }
    let caching = !args.iter().skip(2).any(|arg| arg == "--no-cache");
    let path = Path::new(&args[1]);
    let mut loader = match FileLoader::open(path, false, caching) {
        Ok(loader) => loader,
        Err(err) => {
            eprintln!("node_dump: open {} failed: {}", path.display(), err);
            std::process::exit(1);
        }
    };
    let Some(root) = loader.root() else {
        eprintln!("node_dump: {} has no root node", path.display());
        std::process::exit(1);
    };

    let mut totals = (0usize, 0usize);
    dump(&mut loader, root, 0, &mut totals);
    println!("nodes: {} (parsed {})", totals.0, loader.node_count());
    println!("prop bytes: {}", totals.1);
    if let Some(block) = loader.cache_block_size() {
        println!("cache block size: {}", block);
    }
}
