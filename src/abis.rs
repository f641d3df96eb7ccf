use ethers::contract::abigen;

abigen!(
    Erc20,
    r#"[
        function transfer(address to, uint256 amount) external returns (bool)
        event Transfer(address indexed from, address indexed to, uint256 value)
    ]"#
);
