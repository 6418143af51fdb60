use std::sync::Arc;

use strata::buffer::BufferPoolManager;
use strata::common::{PageId, RecordId, SlotId, Transaction};
use strata::index::{decode_integer_key, encode_integer_key, BPlusTree, IntegerComparator};
use strata::storage::disk::DiskManager;

fn main() {
    println!("Strata - a disk-oriented storage engine core");
    println!("============================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to open database file"));
    println!("Opened database file: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(10, disk_manager));
    println!("Created buffer pool with 10 frames\n");

    let mut tree = BPlusTree::new(
        "demo_index",
        Arc::clone(&bpm),
        Arc::new(IntegerComparator),
        8, // key width
        4, // leaf max size
        4, // internal max size
    );
    let txn = Transaction::default();

    let mut key = [0u8; 8];
    for i in 1..=10i64 {
        encode_integer_key(i, &mut key);
        let rid = RecordId::new(PageId::new(i as i32), SlotId::new(0));
        tree.insert(&key, rid, &txn).expect("insert failed");
    }
    println!("Inserted keys 1..=10\n");

    println!("Tree structure:");
    print!("{}", tree.dump().expect("dump failed"));

    encode_integer_key(7, &mut key);
    let rid = tree.get_value(&key, &txn).expect("lookup failed");
    println!("\nget_value(7) = {:?}", rid);

    print!("scan: ");
    for item in tree.begin().expect("begin failed") {
        let (key, _rid) = item.expect("scan failed");
        print!("{} ", decode_integer_key(&key));
    }
    println!();

    for i in [3i64, 4, 5] {
        encode_integer_key(i, &mut key);
        tree.remove(&key, &txn).expect("remove failed");
    }
    print!("after removing 3,4,5: ");
    for item in tree.begin().expect("begin failed") {
        let (key, _rid) = item.expect("scan failed");
        print!("{} ", decode_integer_key(&key));
    }
    println!();

    bpm.flush_all_pages().expect("flush failed");
    println!("\nFlushed all pages to disk");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
