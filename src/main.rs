fn main() {
    account_shop::run();
}
