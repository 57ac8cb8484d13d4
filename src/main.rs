fn main() {
    goalboard_lib::run()
}
