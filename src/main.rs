use std::sync::Arc;

use heapstore::buffer::BufferPool;
use heapstore::common::{SegmentId, StorageOptions};
use heapstore::storage::fsm::FreeSpaceManager;
use heapstore::storage::segment::SegmentManager;
use heapstore::table::TableHeap;
use heapstore::tuple::{DataType, Schema, TupleBuilder};
use tracing::info;

fn supplier_schema() -> Schema {
    Schema::builder()
        .column("suppkey", DataType::Int32)
        .column("name", DataType::Char(25))
        .column("address", DataType::VarChar(40))
        .column("nationkey", DataType::Int32)
        .column("phone", DataType::Char(15))
        .column("acctbal", DataType::Double)
        .nullable_column("comment", DataType::VarChar(101))
        .with_null_bitmap()
        .build()
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("heapstore - disk-oriented row-store storage engine");
    println!("==================================================\n");

    let opts = StorageOptions::default();
    opts.validate().expect("default options must validate");

    let base_dir = "./dbdata";
    std::fs::create_dir_all(base_dir).expect("create data directory");
    let seg = SegmentId::new(1);

    // Wire the stack: segment file -> buffer pool -> free-space index -> heap.
    let segments = Arc::new(SegmentManager::new(opts.page_size, base_dir));
    segments.ensure_segment(seg).expect("open segment");
    let disk = segments.disk(seg).expect("segment disk");

    let pool = Arc::new(BufferPool::with_options(&opts, disk));
    let fsm = Arc::new(FreeSpaceManager::new(opts.page_size, opts.fsm_bins.clone()));
    {
        let sm = Arc::clone(&segments);
        let sm2 = Arc::clone(&segments);
        fsm.register_segment_probe(
            Box::new(move |s, pid| sm.probe_page_free(s, pid)),
            Box::new(move |s| sm2.page_count(s)),
        );
    }

    let heap = TableHeap::new(
        seg,
        opts.page_size,
        Arc::clone(&pool),
        Arc::clone(&fsm),
        Arc::clone(&segments),
    );
    let schema = supplier_schema();
    info!(page_size = opts.page_size, frames = opts.buffer_pool_frames, replacer = %opts.replacer, "storage stack ready");

    // Load a few sample suppliers.
    let rows = [
        (1, "Supplier#000000001", "27 Main St", 17, "27-918-335-1736", 5755.94, Some("each slyly ironic deposit")),
        (2, "Supplier#000000002", "89 Elm Ave", 5, "15-679-861-2259", 4032.68, None),
        (3, "Supplier#000000003", "14 Oak Blvd", 1, "11-383-516-1199", 4192.40, Some("furiously regular ideas")),
        (4, "Supplier#000000004", "52 Pine Rd", 15, "25-843-787-7479", 4641.08, None),
        (5, "Supplier#000000005", "3 River Way", 11, "21-151-690-3663", -283.84, Some("quickly final accounts")),
    ];

    let mut rids = Vec::new();
    for (suppkey, name, address, nationkey, phone, acctbal, comment) in rows {
        let mut tb = TupleBuilder::new(&schema);
        tb.set_i32(0, suppkey).expect("suppkey");
        tb.set_char(1, name).expect("name");
        tb.set_varchar(2, address).expect("address");
        tb.set_i32(3, nationkey).expect("nationkey");
        tb.set_char(4, phone).expect("phone");
        tb.set_f64(5, acctbal).expect("acctbal");
        match comment {
            Some(c) => tb.set_varchar(6, c).expect("comment"),
            None => tb.set_null(6).expect("comment null"),
        }
        let tuple = tb.build().expect("build row");
        let rid = heap.insert(&tuple).expect("insert row");
        rids.push(rid);
    }
    println!("inserted {} rows into segment {}", rids.len(), seg);

    pool.flush_all().expect("flush");
    segments.disk(seg).expect("disk").sync().expect("sync");

    // Scan back a preview.
    println!("\nscan preview:");
    for (rid, row) in heap.iter() {
        let suppkey = row.get_i32(&schema, 0).expect("suppkey");
        let name = row.get_char(&schema, 1).expect("name");
        let acctbal = row.get_f64(&schema, 5).expect("acctbal");
        let comment = row
            .get_varchar(&schema, 6)
            .unwrap_or_else(|_| "NULL".to_string());
        println!("  rid={rid} suppkey={suppkey} name=\"{name}\" acctbal={acctbal} comment=\"{comment}\"");
    }

    let stats = pool.stats();
    println!(
        "\nbuffer pool: hits={} misses={} evictions={} flushes={}",
        stats.hits, stats.misses, stats.evictions, stats.flushes
    );
    println!("fsm bins: {:?}", fsm.bin_sizes());
    println!("segment pages: {}", segments.page_count(seg));
}
