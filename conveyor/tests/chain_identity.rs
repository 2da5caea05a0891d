//! Scenario 1 (spec §8): send integers 0..9 through a two-stage chain of
//! identity mappers, soft close, and expect outputs 0..9 in order.

use conveyor::prelude::*;

fn identity_stage() -> UnorderedPool<i32, i32, impl WorkerFactory<i32, i32>> {
    // `Chain::add` overwrites both ends via `set_input`/`set_output`, so the
    // channels handed to the pool here are throwaway placeholders.
    let (_tx, rx) = flume::bounded(1);
    let (tx, _rx) = flume::bounded(1);
    UnorderedPool::new(|| FnWorker::new(|x: i32| async move { Ok(vec![x]) }), 1, rx, tx)
}

#[compio::test]
async fn test_two_stage_identity_chain_preserves_order_after_soft_close() {
    let tunables = Tunables::default();
    let mut chain: Chain<i32> = Chain::new(&tunables);
    chain.add(identity_stage());
    chain.add(identity_stage());
    assert_eq!(chain.len(), 2);

    let input = chain.input_sender().unwrap();
    let output = chain.output_receiver().unwrap();
    chain.run();

    for i in 0..10 {
        input.send_async(i).await.unwrap();
    }
    chain.close_input();
    drop(input);

    let mut seen = Vec::new();
    while let Ok(item) = output.recv_async().await {
        seen.push(item);
    }
    assert_eq!(seen, (0..10).collect::<Vec<_>>());

    chain.wait().await.unwrap();
}
