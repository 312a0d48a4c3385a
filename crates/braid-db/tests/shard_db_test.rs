//! End-to-end shard db tests over the RocksDB backend.

use braid_core::types::{
    Address, Branch, CrossShardDeposit, Hash256, MinorBlock, MinorBlockHeader, MinorBlockMeta,
    Receipt, RootBlock, RootBlockHeader, Transaction,
};
use braid_db::{RocksKv, ShardDb, ShardDbConfig};

fn branch() -> Branch {
    Branch::new(2, 0)
}

fn config() -> ShardDbConfig {
    ShardDbConfig { enable_transaction_history: true, ..ShardDbConfig::default() }
}

fn addr(seed: u8) -> Address {
    Address::new([seed; 20], 0)
}

fn make_tx(sender: &Address, to: Option<&Address>, nonce: u64) -> Transaction {
    Transaction {
        sender: sender.recipient,
        to: to.map(|a| a.recipient),
        from_full_shard_key: sender.full_shard_key,
        to_full_shard_key: to.map(|a| a.full_shard_key).unwrap_or_default(),
        value: 1_000,
        gas_token_id: 0,
        transfer_token_id: 0,
        nonce,
        payload: vec![],
    }
}

fn make_minor_block(height: u32, prev: Hash256, tx_list: Vec<Transaction>) -> MinorBlock {
    let receipts = tx_list
        .iter()
        .map(|_| Receipt { success: true, gas_used: 21_000 })
        .collect();
    MinorBlock {
        header: MinorBlockHeader {
            version: 1,
            height,
            create_time: 1_700_000_000 + u64::from(height),
            hash_prev_minor_block: prev,
            hash_merkle_root: Hash256::ZERO,
        },
        meta: MinorBlockMeta::default(),
        tx_list,
        receipts,
    }
}

fn make_root_block(height: u32, prev: Hash256, confirmed: Vec<MinorBlockHeader>) -> RootBlock {
    RootBlock {
        header: RootBlockHeader {
            version: 1,
            height,
            create_time: 1_700_000_000 + u64::from(height),
            hash_prev_block: prev,
            hash_merkle_root: Hash256::ZERO,
        },
        minor_block_headers: confirmed,
    }
}

/// Build a short shard chain confirmed by a root block, then reopen the
/// database cold and verify recovery reseeds everything.
#[test]
fn persist_reopen_recover() {
    let dir = tempfile::tempdir().unwrap();
    let user = addr(0x11);

    let (root_header, tip_header) = {
        let store = RocksKv::open(dir.path().join("shard0")).unwrap();
        let mut db = ShardDb::new(store, branch(), config());

        let mut prev = Hash256::ZERO;
        let mut headers = Vec::new();
        for h in 0..4u32 {
            let block = make_minor_block(h, prev, vec![make_tx(&user, None, u64::from(h))]);
            prev = block.header.hash();
            db.put_minor_block(&block, &[]).unwrap();
            db.put_minor_block_index(&block).unwrap();
            db.put_transaction_index_from_block(&block).unwrap();
            headers.push(block.header);
        }

        let root = make_root_block(0, Hash256::ZERO, headers.clone());
        db.put_root_block(&root, headers.last(), None).unwrap();
        (root.header, headers.last().unwrap().clone())
    };

    let store = RocksKv::open(dir.path().join("shard0")).unwrap();
    let mut db = ShardDb::new(store, branch(), config());
    db.recover_state(&root_header, &tip_header).unwrap();

    let root_hash = root_header.hash();
    assert!(db.contain_root_block_by_hash(&root_hash).unwrap());
    assert_eq!(
        db.get_last_confirmed_minor_block_header_at_root_block(&root_hash)
            .unwrap(),
        Some(tip_header.clone())
    );
    for h in 0..4u32 {
        let block = db.get_minor_block_by_height(h).unwrap().unwrap();
        assert_eq!(block.header.height, h);
        assert!(db.contain_minor_block_by_hash(&block.header.hash()).unwrap());
    }

    // the address history survived the reopen
    let (page, _) = db.get_transactions_by_address(&user, None, 10).unwrap();
    assert_eq!(
        page.iter().map(|d| d.block_height).collect::<Vec<_>>(),
        vec![3, 2, 1, 0]
    );
}

#[test]
fn transaction_lookup_through_rocksdb() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksKv::open(dir.path().join("shard0")).unwrap();
    let mut db = ShardDb::new(store, branch(), config());

    let user = addr(0x11);
    let peer = addr(0x22);
    let t = make_tx(&user, Some(&peer), 0);
    let block = make_minor_block(5, Hash256([0xAA; 32]), vec![t.clone()]);
    db.put_minor_block(&block, &[]).unwrap();
    db.put_minor_block_index(&block).unwrap();
    db.put_transaction_index_from_block(&block).unwrap();

    let tx_hash = t.hash().unwrap();
    let (found_block, index) = db.get_transaction_by_hash(&tx_hash).unwrap().unwrap();
    assert_eq!(found_block, block);
    assert_eq!(index, 0);

    db.remove_transaction_index_from_block(&block).unwrap();
    assert_eq!(db.get_transaction_by_hash(&tx_hash).unwrap(), None);
}

#[test]
fn cross_shard_deposits_appear_in_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksKv::open(dir.path().join("shard0")).unwrap();
    let mut db = ShardDb::new(store, branch(), config());

    let user = addr(0x11);
    let deposit = CrossShardDeposit {
        tx_hash: Hash256([0x99; 32]),
        from_address: Address::new([0x33; 20], 1),
        to_address: user,
        value: 777,
        gas_token_id: 0,
        transfer_token_id: 0,
    };
    let block = make_minor_block(2, Hash256::ZERO, vec![]);
    db.put_minor_block(&block, std::slice::from_ref(&deposit)).unwrap();
    db.put_minor_block_index(&block).unwrap();
    db.put_transaction_index_from_block(&block).unwrap();

    let (page, _) = db.get_transactions_by_address(&user, None, 10).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].tx_hash, Hash256([0x99; 32]));
    assert_eq!(page[0].value, 777);
    assert!(page[0].success);
}

#[test]
fn cumulative_tx_count_accumulates_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let user = addr(0x11);

    let hashes = {
        let store = RocksKv::open(dir.path().join("shard0")).unwrap();
        let mut db = ShardDb::new(store, branch(), config());
        let mut prev = Hash256::ZERO;
        let mut hashes = Vec::new();
        for h in 1..6u32 {
            let txs = (0..h).map(|i| make_tx(&user, None, u64::from(h * 100 + i))).collect();
            let block = make_minor_block(h, prev, txs);
            prev = block.header.hash();
            db.put_minor_block(&block, &[]).unwrap();
            hashes.push(prev);
        }
        hashes
    };

    let store = RocksKv::open(dir.path().join("shard0")).unwrap();
    let db = ShardDb::new(store, branch(), config());
    // heights 1 and 2 stand alone; accumulation starts at height 3
    assert_eq!(db.get_total_tx_count(&hashes[0]).unwrap(), 1);
    assert_eq!(db.get_total_tx_count(&hashes[1]).unwrap(), 2);
    assert_eq!(db.get_total_tx_count(&hashes[2]).unwrap(), 5);
    assert_eq!(db.get_total_tx_count(&hashes[3]).unwrap(), 9);
    assert_eq!(db.get_total_tx_count(&hashes[4]).unwrap(), 14);
}
