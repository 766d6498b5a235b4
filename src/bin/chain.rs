use pact::combinator::Input;
use pact::promise::Promise;
use pact::scheduler::Executor;

fn main() {
    let lookup = Promise::<u32, String>::deferred();

    let report = lookup
        .promise
        .then(|n| Ok((n * 2).into()))
        .then(|n| {
            println!("doubled: {n}");
            Ok(n.into())
        })
        .catch(|reason| {
            println!("failed: {reason}");
            Ok(0.into())
        });

    let totals: Promise<Vec<u32>, String> = Promise::all([
        Input::Value(1),
        Input::Promise(lookup.promise.clone()),
        Input::Value(3),
    ]);

    lookup.resolve(21);

    println!("chain: {:?}", Executor::block_on(&report));
    println!("all:   {:?}", Executor::block_on(&totals));
}
