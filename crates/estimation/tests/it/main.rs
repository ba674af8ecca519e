mod evm;
mod tezos;
